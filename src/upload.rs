use std::collections::VecDeque;

use crate::{FenceTracker, GfxError, GfxResult};

/// Size of one CPU-visible upload page.
pub const UPLOAD_PAGE_SIZE: u64 = 2 * 1024 * 1024;

/// Every upload allocation is rounded up to this, matching the constant
/// buffer placement alignment of explicit APIs.
pub const UPLOAD_ALLOC_ALIGNMENT: u64 = 256;

/// A range of CPU-visible upload memory. `size` is the charged (rounded)
/// size, not the requested one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UploadAllocation {
    pub page_id: u32,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug)]
struct UploadPage {
    page_id: u32,
    data: Vec<u8>,
    head: u64,
}

impl UploadPage {
    fn new(page_id: u32, page_size: u64) -> Self {
        Self {
            page_id,
            data: vec![0; page_size as usize],
            head: 0,
        }
    }
}

/// Linear allocator over fence-recycled upload pages. Allocations within a
/// frame bump a cursor; `discard_pages` retires everything handed out since
/// the previous discard, and retired pages come back once their fence
/// completes.
#[derive(Debug)]
pub struct UploadAllocator {
    page_size: u64,
    /// Pages written since the last discard; the last one is the bump target
    active: Vec<UploadPage>,
    retired: VecDeque<(u64, UploadPage)>,
    next_page_id: u32,
}

impl UploadAllocator {
    pub fn new() -> Self {
        Self::with_page_size(UPLOAD_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: u64) -> Self {
        assert!(page_size % UPLOAD_ALLOC_ALIGNMENT == 0);
        Self {
            page_size,
            active: Vec::new(),
            retired: VecDeque::new(),
            next_page_id: 0,
        }
    }

    /// Reserves `size` bytes, charged in `UPLOAD_ALLOC_ALIGNMENT` units. A
    /// zero-byte request still charges one alignment unit. Requests larger
    /// than the page size are an error rather than a bigger page.
    pub fn allocate(
        &mut self,
        size: u64,
        fence_tracker: &dyn FenceTracker,
    ) -> GfxResult<UploadAllocation> {
        let rounded = ((size + UPLOAD_ALLOC_ALIGNMENT - 1) / UPLOAD_ALLOC_ALIGNMENT)
            .max(1)
            * UPLOAD_ALLOC_ALIGNMENT;
        if rounded > self.page_size {
            return Err(format!(
                "upload allocation of {} bytes exceeds page size {}",
                size, self.page_size
            )
            .into());
        }

        let needs_page = match self.active.last() {
            Some(page) => page.head + rounded > self.page_size,
            None => true,
        };
        if needs_page {
            let page = self.acquire_page(fence_tracker);
            self.active.push(page);
        }

        let page = match self.active.last_mut() {
            Some(page) => page,
            None => return Err("upload allocator has no active page".into()),
        };
        let offset = page.head;
        page.head += rounded;
        Ok(UploadAllocation {
            page_id: page.page_id,
            offset,
            size: rounded,
        })
    }

    fn acquire_page(&mut self, fence_tracker: &dyn FenceTracker) -> UploadPage {
        if let Some((fence_value, _)) = self.retired.front() {
            if fence_tracker.is_fence_complete(*fence_value) {
                if let Some((_, mut page)) = self.retired.pop_front() {
                    page.head = 0;
                    return page;
                }
            }
        }
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        log::debug!("Allocating new upload page {}", page_id);
        UploadPage::new(page_id, self.page_size)
    }

    /// Copies `data` into an allocation's backing memory.
    pub fn write(&mut self, allocation: &UploadAllocation, data: &[u8]) -> GfxResult<()> {
        if data.len() as u64 > allocation.size {
            return Err("upload write exceeds the allocated range".into());
        }
        let page = self
            .active
            .iter_mut()
            .find(|page| page.page_id == allocation.page_id)
            .ok_or_else(|| GfxError::from("upload write against a retired page"))?;
        let begin = allocation.offset as usize;
        page.data[begin..begin + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Retires every active page; their memory is reusable once
    /// `fence_value` completes.
    pub fn discard_pages(&mut self, fence_value: u64) {
        for page in self.active.drain(..) {
            self.retired.push_back((fence_value, page));
        }
    }

    /// Number of pages ever created. Growth beyond the steady state means
    /// frames allocate faster than fences retire.
    pub fn page_count(&self) -> u32 {
        self.next_page_id
    }
}

impl Default for UploadAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct TestFences(Cell<u64>);

    impl FenceTracker for TestFences {
        fn is_fence_complete(&self, fence_value: u64) -> bool {
            fence_value <= self.0.get()
        }

        fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()> {
            self.0.set(self.0.get().max(fence_value));
            Ok(())
        }
    }

    #[test]
    fn sizes_are_charged_in_alignment_units() {
        let fences = TestFences(Cell::new(0));
        let mut allocator = UploadAllocator::new();

        let a = allocator.allocate(257, &fences).unwrap();
        assert_eq!(a.size, 512);
        assert_eq!(a.offset, 0);

        let b = allocator.allocate(0, &fences).unwrap();
        assert_eq!(b.size, 256);
        assert_eq!(b.offset, 512);

        let c = allocator.allocate(256, &fences).unwrap();
        assert_eq!(c.size, 256);
        assert_eq!(c.offset, 768);
    }

    #[test]
    fn oversized_request_is_an_error() {
        let fences = TestFences(Cell::new(0));
        let mut allocator = UploadAllocator::new();
        assert!(allocator.allocate(UPLOAD_PAGE_SIZE + 1, &fences).is_err());
        assert!(allocator.allocate(UPLOAD_PAGE_SIZE, &fences).is_ok());
    }

    #[test]
    fn rollover_opens_a_new_page() {
        let fences = TestFences(Cell::new(0));
        let mut allocator = UploadAllocator::with_page_size(1024);

        let a = allocator.allocate(768, &fences).unwrap();
        let b = allocator.allocate(512, &fences).unwrap();
        assert_ne!(a.page_id, b.page_id);
        assert_eq!(b.offset, 0);
        assert_eq!(allocator.page_count(), 2);
    }

    #[test]
    fn retired_pages_come_back_after_their_fence() {
        let fences = TestFences(Cell::new(0));
        let mut allocator = UploadAllocator::with_page_size(1024);

        let first = allocator.allocate(1024, &fences).unwrap();
        allocator.discard_pages(7);

        // Fence not complete: a fresh page is created.
        let second = allocator.allocate(1024, &fences).unwrap();
        assert_ne!(second.page_id, first.page_id);
        allocator.discard_pages(8);

        fences.0.set(7);
        let third = allocator.allocate(64, &fences).unwrap();
        assert_eq!(third.page_id, first.page_id);
        assert_eq!(third.offset, 0);
        assert_eq!(allocator.page_count(), 2);
    }

    #[test]
    fn writes_land_at_the_allocated_offset() {
        let fences = TestFences(Cell::new(0));
        let mut allocator = UploadAllocator::with_page_size(1024);

        let a = allocator.allocate(4, &fences).unwrap();
        let b = allocator.allocate(4, &fences).unwrap();
        allocator.write(&a, &[1, 2, 3, 4]).unwrap();
        allocator.write(&b, &[9, 9]).unwrap();

        let page = allocator.active.last().unwrap();
        assert_eq!(&page.data[0..4], &[1, 2, 3, 4]);
        assert_eq!(&page.data[256..258], &[9, 9]);

        assert!(allocator.write(&a, &[0; 300]).is_err());
    }
}
