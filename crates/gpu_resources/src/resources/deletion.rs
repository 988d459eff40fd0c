//! Deletion Queue
//!
//! Deferred destruction keyed on a frame countdown. Each entry starts at the
//! number of frames in flight and is decremented by the owning frame loop;
//! once it hits zero no command buffer recorded before the submission can
//! still be executing, so the native objects may be destroyed.

use crate::resources::handle::{ResourceHandle, ResourceKind};

/// One resource waiting to be destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionEntry {
    /// Resource to destroy
    pub handle: ResourceHandle,
    /// Frames left before destruction is safe
    pub remaining: u32,
}

/// Pending deletions for every resource kind
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<DeletionEntry>,
}

impl DeletionQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `handle` for destruction after `frames` ticks
    pub fn push(&mut self, handle: ResourceHandle, frames: u32) {
        debug_assert!(!self.contains(handle), "{} queued twice", handle);
        self.entries.push(DeletionEntry { handle, remaining: frames });
    }

    /// Advance every entry by `frames_elapsed` and take the ones that expired
    ///
    /// Expired handles come back ordered so that dependents go first: shaders,
    /// then texture views, then textures, then buffers. Within a kind the
    /// submission order is kept.
    pub fn process(&mut self, frames_elapsed: u32) -> Vec<ResourceHandle> {
        if frames_elapsed == 0 {
            return Vec::new();
        }

        let mut expired = Vec::new();
        self.entries.retain_mut(|entry| {
            entry.remaining = entry.remaining.saturating_sub(frames_elapsed);
            if entry.remaining == 0 {
                expired.push(entry.handle);
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|handle| destruction_rank(handle.kind()));
        expired
    }

    /// Take every entry regardless of its countdown, in destruction order
    pub fn drain_all(&mut self) -> Vec<ResourceHandle> {
        let mut all: Vec<ResourceHandle> = self.entries.drain(..).map(|e| e.handle).collect();
        all.sort_by_key(|handle| destruction_rank(handle.kind()));
        all
    }

    /// Whether `handle` is queued
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    /// Frames left for `handle`, if queued
    pub fn remaining(&self, handle: ResourceHandle) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.remaining)
    }

    /// Queued entries in submission order
    pub fn entries(&self) -> &[DeletionEntry] {
        &self.entries
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn destruction_rank(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::Shader | ResourceKind::ShaderVariant | ResourceKind::ComputeShader => 0,
        ResourceKind::TextureView => 1,
        ResourceKind::Texture => 2,
        ResourceKind::Buffer => 3,
    }
}
