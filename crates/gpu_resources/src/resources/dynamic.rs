//! Dynamic buffer pool
//!
//! Fixed-size, persistently mapped uniform blocks for per-frame data. A block
//! handed back is not reused until the frame it was returned in has left
//! flight, so the GPU never reads a block the CPU is already rewriting.

use std::collections::{HashSet, VecDeque};

use crate::resources::handle::BufferHandle;

/// A block handed out by [`crate::ResourceManager::request_dynamic_buffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicBlock {
    /// Host-visible uniform buffer backing the block
    pub buffer: BufferHandle,
    /// Usable bytes
    pub size: u64,
}

#[derive(Debug)]
pub(crate) struct DynamicBufferPool {
    block_size: u64,
    owned: HashSet<BufferHandle>,
    available: Vec<BufferHandle>,
    returned: VecDeque<(BufferHandle, u64)>,
}

impl DynamicBufferPool {
    pub(crate) fn new(block_size: u64) -> Self {
        Self {
            block_size,
            owned: HashSet::new(),
            available: Vec::new(),
            returned: VecDeque::new(),
        }
    }

    pub(crate) fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Move blocks whose return frame has aged out of flight back to the free list
    pub(crate) fn recycle(&mut self, current_frame: u64, frames_in_flight: u32) {
        while let Some(&(buffer, returned_frame)) = self.returned.front() {
            if returned_frame + u64::from(frames_in_flight) > current_frame {
                break;
            }
            self.returned.pop_front();
            self.available.push(buffer);
        }
    }

    pub(crate) fn take(&mut self) -> Option<BufferHandle> {
        self.available.pop()
    }

    pub(crate) fn adopt(&mut self, buffer: BufferHandle) {
        self.owned.insert(buffer);
    }

    pub(crate) fn owns(&self, buffer: BufferHandle) -> bool {
        self.owned.contains(&buffer)
    }

    pub(crate) fn is_outstanding(&self, buffer: BufferHandle) -> bool {
        self.owns(buffer)
            && !self.available.contains(&buffer)
            && !self.returned.iter().any(|(b, _)| *b == buffer)
    }

    pub(crate) fn give_back(&mut self, buffer: BufferHandle, frame: u64) {
        self.returned.push_back((buffer, frame));
    }

    /// Stop tracking a block that is being deleted directly
    pub(crate) fn forget(&mut self, buffer: BufferHandle) -> bool {
        self.available.retain(|b| *b != buffer);
        self.returned.retain(|(b, _)| *b != buffer);
        self.owned.remove(&buffer)
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.available.len() + self.returned.len()
    }

    /// Forget every block, returning them for destruction
    pub(crate) fn drain(&mut self) -> Vec<BufferHandle> {
        self.available.clear();
        self.returned.clear();
        self.owned.drain().collect()
    }
}
