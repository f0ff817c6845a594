use std::collections::VecDeque;

use fnv::FnvHashMap;

use crate::{GfxResult, MAX_SAMPLER_TABLE_SIZE, MAX_STATIC_SAMPLERS};

/// Fence state the bind heaps poll while reclaiming blocks. Implemented by
/// `CommandQueue`; tests provide their own.
pub trait FenceTracker {
    fn is_fence_complete(&self, fence_value: u64) -> bool;
    fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()>;
}

#[derive(Debug)]
struct DiscardedBlock {
    fence_value: u64,
    size: u32,
}

/// Ring allocator over the shader-visible view descriptor space. Draws
/// allocate contiguous ranges out of the current block; submitting a frame
/// closes the block with the submit fence, and the range becomes reusable
/// once that fence completes.
#[derive(Debug)]
pub struct ViewBindHeap {
    capacity: u32,
    head: u32,
    used: u32,
    block_open: bool,
    current_block_size: u32,
    discarded: VecDeque<DiscardedBlock>,
}

impl ViewBindHeap {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            head: 0,
            used: 0,
            block_open: false,
            current_block_size: 0,
            discarded: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Opens the block the next ranges are charged against.
    pub fn begin_block(&mut self) {
        assert!(!self.block_open);
        self.block_open = true;
    }

    /// Closes the current block; its descriptor space is reclaimed once
    /// `fence_value` completes.
    pub fn end_block(&mut self, fence_value: u64) {
        assert!(self.block_open);
        self.block_open = false;
        if self.current_block_size > 0 {
            self.discarded.push_back(DiscardedBlock {
                fence_value,
                size: self.current_block_size,
            });
            self.current_block_size = 0;
        }
    }

    /// Returns the base slot of a contiguous `num` slot range. Wraps to the
    /// heap start when the tail cannot fit the range (the skipped tail is
    /// charged to the current block), and reclaims fence-completed blocks
    /// when space runs out. Stalls on the oldest in-flight block as a last
    /// resort.
    pub fn request_range(
        &mut self,
        num: u32,
        fence_tracker: &dyn FenceTracker,
    ) -> GfxResult<u32> {
        assert!(self.block_open);
        assert!(num > 0);
        if num > self.capacity {
            return Err(format!(
                "view bind heap range of {} exceeds heap capacity {}",
                num, self.capacity
            )
            .into());
        }

        let wrap_waste = if self.head + num > self.capacity {
            self.capacity - self.head
        } else {
            0
        };
        let needed = num + wrap_waste;

        while self.used + needed > self.capacity {
            match self.discarded.pop_front() {
                Some(block) => {
                    if !fence_tracker.is_fence_complete(block.fence_value) {
                        log::warn!("Performance warning: waiting for view bind heap space");
                        fence_tracker.wait_for_fence(block.fence_value)?;
                    }
                    self.used -= block.size;
                }
                None => return Err("not enough space in view bind heap".into()),
            }
        }

        if wrap_waste > 0 {
            self.current_block_size += wrap_waste;
            self.head = 0;
        }
        let base = self.head;
        self.head += num;
        self.used += needed;
        self.current_block_size += num;
        Ok(base)
    }
}

/// Result of a sampler-table request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SamplerTableAllocation {
    /// Base slot of the table in the shader-visible sampler space
    pub base: u32,
    /// Whether the table was newly allocated and its descriptors still have
    /// to be copied in
    pub created: bool,
}

/// Persistent dedup allocator for sampler tables. Sampler combinations
/// repeat heavily across draws, so identical source-index sets share one
/// shader-visible table for the lifetime of the device.
#[derive(Debug)]
pub struct SamplerBindHeap {
    capacity: u32,
    next_free: u32,
    tables: FnvHashMap<u64, u32>,
}

impl SamplerBindHeap {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next_free: 0,
            tables: FnvHashMap::default(),
        }
    }

    /// Looks up or allocates the table for the given static-heap source
    /// indices. At most `MAX_SAMPLER_TABLE_SIZE` sources, each below
    /// `MAX_STATIC_SAMPLERS`, so the whole set packs into one 64-bit key.
    pub fn request(&mut self, sources: &[u32]) -> GfxResult<SamplerTableAllocation> {
        assert!(sources.len() <= MAX_SAMPLER_TABLE_SIZE);
        let mut key = 0u64;
        for &index in sources {
            assert!(index < MAX_STATIC_SAMPLERS as u32);
            key = (key << 4) | u64::from(index);
        }
        key = (key << 4) | sources.len() as u64;

        if let Some(&base) = self.tables.get(&key) {
            return Ok(SamplerTableAllocation {
                base,
                created: false,
            });
        }

        let num = sources.len() as u32;
        if self.next_free + num > self.capacity {
            return Err("not enough space in sampler bind heap".into());
        }
        let base = self.next_free;
        self.next_free += num;
        self.tables.insert(key, base);
        Ok(SamplerTableAllocation {
            base,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct TestFences {
        completed: Cell<u64>,
        waits: Cell<u32>,
    }

    impl TestFences {
        fn new() -> Self {
            Self {
                completed: Cell::new(0),
                waits: Cell::new(0),
            }
        }
    }

    impl FenceTracker for TestFences {
        fn is_fence_complete(&self, fence_value: u64) -> bool {
            fence_value <= self.completed.get()
        }

        fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()> {
            self.waits.set(self.waits.get() + 1);
            if fence_value > self.completed.get() {
                self.completed.set(fence_value);
            }
            Ok(())
        }
    }

    #[test]
    fn ranges_are_contiguous_within_a_block() {
        let fences = TestFences::new();
        let mut heap = ViewBindHeap::new(64);
        heap.begin_block();
        assert_eq!(heap.request_range(8, &fences).unwrap(), 0);
        assert_eq!(heap.request_range(4, &fences).unwrap(), 8);
        assert_eq!(heap.request_range(1, &fences).unwrap(), 12);
        heap.end_block(1);
    }

    #[test]
    fn wraps_when_tail_cannot_fit() {
        let fences = TestFences::new();
        fences.completed.set(10);
        let mut heap = ViewBindHeap::new(16);

        heap.begin_block();
        assert_eq!(heap.request_range(12, &fences).unwrap(), 0);
        heap.end_block(1);

        // 4 slots remain at the tail; an 8 slot range has to wrap and
        // reclaim the completed block first.
        heap.begin_block();
        assert_eq!(heap.request_range(8, &fences).unwrap(), 0);
        heap.end_block(2);
    }

    #[test]
    fn stalls_on_incomplete_fence_before_reuse() {
        let fences = TestFences::new();
        let mut heap = ViewBindHeap::new(16);

        heap.begin_block();
        heap.request_range(16, &fences).unwrap();
        heap.end_block(3);

        heap.begin_block();
        assert_eq!(heap.request_range(16, &fences).unwrap(), 0);
        assert_eq!(fences.waits.get(), 1);
        assert!(fences.completed.get() >= 3);
        heap.end_block(4);
    }

    #[test]
    fn fails_when_no_block_can_be_reclaimed() {
        let fences = TestFences::new();
        let mut heap = ViewBindHeap::new(16);
        heap.begin_block();
        heap.request_range(12, &fences).unwrap();
        assert!(heap.request_range(8, &fences).is_err());
    }

    #[test]
    fn oversized_range_is_rejected() {
        let fences = TestFences::new();
        let mut heap = ViewBindHeap::new(16);
        heap.begin_block();
        assert!(heap.request_range(17, &fences).is_err());
    }

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }
    }

    // Randomized blocks and fence completion orderings; a handed-out range
    // must never overlap a range whose fence has not completed.
    #[test]
    fn ring_never_hands_out_live_ranges() {
        let mut rng = XorShift(0x1234_5678_9abc_def0);
        for _round in 0..50 {
            let capacity = 32 + (rng.next() % 96) as u32;
            let fences = TestFences::new();
            let mut heap = ViewBindHeap::new(capacity);

            // (fence_value, base, num) of every range still considered live
            let mut live: Vec<(u64, u32, u32)> = Vec::new();
            let mut fence_value = 1u64;

            for _block in 0..40 {
                heap.begin_block();
                // One block must fit the heap on its own or the allocator is
                // entitled to fail; a range of `num` charges at most
                // `2 * num - 1` slots counting wrap waste.
                let mut block_charged = 0u32;
                let allocs = 1 + rng.next() % 4;
                for _ in 0..allocs {
                    let num = 1 + (rng.next() % 16) as u32;
                    if block_charged + 2 * num > capacity {
                        continue;
                    }
                    block_charged += 2 * num;
                    let base = heap.request_range(num, &fences).unwrap();
                    assert!(base + num <= capacity);

                    // Everything the simulated device finished is dead now.
                    live.retain(|(f, _, _)| *f > fences.completed.get());
                    for &(_, lbase, lnum) in &live {
                        let overlap = base < lbase + lnum && lbase < base + num;
                        assert!(
                            !overlap,
                            "range [{}, {}) overlaps live [{}, {})",
                            base,
                            base + num,
                            lbase,
                            lbase + lnum
                        );
                    }
                    live.push((fence_value, base, num));
                }
                heap.end_block(fence_value);
                // Let the device progress at random.
                if rng.next() % 3 == 0 {
                    let target = fences.completed.get() + 1 + rng.next() % 2;
                    fences.completed.set(target.min(fence_value));
                }
                fence_value += 1;
            }
        }
    }

    #[test]
    fn sampler_tables_dedup_on_equal_sources() {
        let mut heap = SamplerBindHeap::new(32);
        let first = heap.request(&[0, 3, 7]).unwrap();
        assert!(first.created);
        let second = heap.request(&[0, 3, 7]).unwrap();
        assert_eq!(second.base, first.base);
        assert!(!second.created);

        // Same multiset, different order is a different table.
        let third = heap.request(&[3, 0, 7]).unwrap();
        assert!(third.created);
        assert_ne!(third.base, first.base);
    }

    #[test]
    fn sampler_key_includes_count() {
        let mut heap = SamplerBindHeap::new(32);
        // [1] and [0, 1] must not collide even though the packed index bits
        // line up.
        let a = heap.request(&[1]).unwrap();
        let b = heap.request(&[0, 1]).unwrap();
        assert!(b.created);
        assert_ne!(a.base, b.base);
    }

    #[test]
    fn sampler_heap_exhaustion_is_an_error() {
        let mut heap = SamplerBindHeap::new(4);
        heap.request(&[0, 1, 2]).unwrap();
        assert!(heap.request(&[4, 5]).is_err());
    }
}
