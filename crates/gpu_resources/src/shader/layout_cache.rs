//! Descriptor Layout Cache
//!
//! Content-addressed cache of native bind group layouts. Two descriptors with
//! the same binding shape always resolve to the same native layout.
//!
//! The structural hash only picks a bucket. Every entry in the bucket is
//! compared with full equality, so descriptors whose hashes collide still get
//! distinct layouts.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::shader::layout::BindGroupLayoutDesc;

/// Cache of native layouts keyed by layout shape
#[derive(Debug)]
pub struct DescriptorLayoutCache<L, S = RandomState> {
    buckets: HashMap<u64, Vec<(BindGroupLayoutDesc, L)>>,
    hasher: S,
    len: usize,
}

impl<L: Copy> DescriptorLayoutCache<L, RandomState> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<L: Copy> Default for DescriptorLayoutCache<L, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Copy, S: BuildHasher> DescriptorLayoutCache<L, S> {
    /// Create an empty cache hashing with `hasher`
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            buckets: HashMap::new(),
            hasher,
            len: 0,
        }
    }

    /// Structural hash of a descriptor
    pub fn structural_hash(&self, desc: &BindGroupLayoutDesc) -> u64 {
        self.hasher.hash_one(desc)
    }

    /// Cached layout for `desc`, if any
    pub fn get(&self, desc: &BindGroupLayoutDesc) -> Option<L> {
        self.buckets
            .get(&self.structural_hash(desc))?
            .iter()
            .find(|(cached, _)| cached == desc)
            .map(|(_, layout)| *layout)
    }

    /// Return the cached layout for `desc`, building it with `create` on a miss
    pub fn get_or_create<E>(
        &mut self,
        desc: &BindGroupLayoutDesc,
        create: impl FnOnce(&BindGroupLayoutDesc) -> Result<L, E>,
    ) -> Result<L, E> {
        let hash = self.structural_hash(desc);
        let bucket = self.buckets.entry(hash).or_default();

        if let Some((_, layout)) = bucket.iter().find(|(cached, _)| cached == desc) {
            log::trace!("Layout cache hit ({} bindings, hash {:#018x})", desc.bindings.len(), hash);
            return Ok(*layout);
        }

        if !bucket.is_empty() {
            log::debug!("Layout hash collision on {:#018x}, {} entries in bucket", hash, bucket.len());
        }

        let layout = create(desc)?;
        bucket.push((desc.clone(), layout));
        self.len += 1;
        log::debug!("Created bind group layout ({} bindings)", desc.bindings.len());
        Ok(layout)
    }

    /// Number of cached layouts
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every entry, returning the native layouts for destruction
    pub fn drain(&mut self) -> Vec<L> {
        self.len = 0;
        self.buckets
            .drain()
            .flat_map(|(_, bucket)| bucket.into_iter().map(|(_, layout)| layout))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::layout::ShaderStages;
    use std::hash::Hasher;

    /// Hashes everything to the same value
    #[derive(Default)]
    struct CollidingState;

    struct CollidingHasher;

    impl Hasher for CollidingHasher {
        fn finish(&self) -> u64 {
            7
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for CollidingState {
        type Hasher = CollidingHasher;

        fn build_hasher(&self) -> CollidingHasher {
            CollidingHasher
        }
    }

    fn uniform_layout() -> BindGroupLayoutDesc {
        BindGroupLayoutDesc::new().add_uniform_buffer(0, ShaderStages::VERTEX)
    }

    fn texture_layout() -> BindGroupLayoutDesc {
        BindGroupLayoutDesc::new().add_sampled_texture(0, ShaderStages::PIXEL)
    }

    #[test]
    fn test_identical_layouts_share_handle() {
        let mut cache = DescriptorLayoutCache::new();
        let mut created = 0u32;
        let mut create = |_: &BindGroupLayoutDesc| -> Result<u32, ()> {
            created += 1;
            Ok(created)
        };

        let a = cache.get_or_create(&uniform_layout(), &mut create).unwrap();
        let b = cache.get_or_create(&uniform_layout(), &mut create).unwrap();
        let c = cache.get_or_create(&texture_layout(), &mut create).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(created, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_collisions_do_not_alias() {
        let mut cache = DescriptorLayoutCache::with_hasher(CollidingState);
        assert_eq!(
            cache.structural_hash(&uniform_layout()),
            cache.structural_hash(&texture_layout())
        );

        let a = cache.get_or_create(&uniform_layout(), |_| Ok::<_, ()>(1u32)).unwrap();
        let b = cache.get_or_create(&texture_layout(), |_| Ok::<_, ()>(2u32)).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.get(&uniform_layout()), Some(1));
        assert_eq!(cache.get(&texture_layout()), Some(2));
    }

    #[test]
    fn test_failed_create_caches_nothing() {
        let mut cache: DescriptorLayoutCache<u32> = DescriptorLayoutCache::new();
        let result = cache.get_or_create(&uniform_layout(), |_| Err("device lost"));
        assert_eq!(result, Err("device lost"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&uniform_layout()), None);
    }

    #[test]
    fn test_drain_returns_all_layouts() {
        let mut cache = DescriptorLayoutCache::with_hasher(CollidingState);
        cache.get_or_create(&uniform_layout(), |_| Ok::<_, ()>(1u32)).unwrap();
        cache.get_or_create(&texture_layout(), |_| Ok::<_, ()>(2u32)).unwrap();
        let mut drained = cache.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 2]);
        assert!(cache.is_empty());
    }
}
