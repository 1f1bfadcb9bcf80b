use alloc::{alloc as raw, vec::Vec};
use core::{
    alloc::{Layout, LayoutError},
    cmp, fmt, mem,
    ptr::NonNull,
};
use hyphae::{
    allocator::{AllocError, NodeAlloc},
    mpsc_queue,
};
use maitake_sync::{blocking::Mutex, spin::Spinlock};

/// A thread-safe pool of fixed-size slots.
///
/// Memory is requested from the global allocator one page at a time, where a
/// page holds [`page_slots`](Slab::with_page_slots) slots. Slots are carved
/// out of the newest page in order; a slot that is [deallocated] goes onto an
/// intrusive free list and is handed out again before any fresh slot.
/// Pages are only returned to the global allocator when the `Slab` is
/// dropped.
///
/// A `Slab` implements [`NodeAlloc`], so it can back an [`MpscQueue`]
/// directly, by reference, or through an [`Arc`].
///
/// [deallocated]: NodeAlloc::deallocate
/// [`MpscQueue`]: hyphae::MpscQueue
/// [`Arc`]: alloc::sync::Arc
pub struct Slab {
    /// The layout of each slot, padded to a multiple of its alignment.
    slot: Layout,
    /// The layout of each page.
    page: Layout,
    page_slots: usize,
    state: Mutex<State, Spinlock>,
}

/// Errors returned when constructing a [`Slab`] with an unusable geometry.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SlabError {
    /// A slab page must contain at least one slot.
    #[error("a slab page must contain at least one slot")]
    ZeroSlots,
    /// The slot or page size overflows the address space.
    #[error("slab page of {page_slots} slots is too large")]
    TooLarge {
        /// The requested number of slots per page.
        page_slots: usize,
    },
    /// The slot layout could not be padded to hold a free-list link.
    #[error("invalid slab slot layout")]
    Layout(#[from] LayoutError),
}

struct State {
    /// Head of the list of slots that have been returned.
    free: Option<NonNull<FreeSlot>>,
    /// Every page allocated so far. Fresh slots are carved from the last one.
    pages: Vec<NonNull<u8>>,
    /// Index of the next never-used slot in the last page.
    next_slot: usize,
    /// Number of slots currently handed out.
    allocated: usize,
}

/// The contents of a slot while it sits on the free list.
struct FreeSlot {
    next: Option<NonNull<FreeSlot>>,
}

// === impl Slab ===

impl Slab {
    /// The number of slots in each page when none is specified.
    pub const DEFAULT_PAGE_SLOTS: usize = 64;

    /// Returns a new `Slab` whose slots can hold the node of an
    /// [`MpscQueue<T>`](hyphae::MpscQueue).
    #[must_use]
    pub fn for_queue<T>() -> Self {
        Self::new(mpsc_queue::node_layout::<T>())
    }

    /// Returns a new `Slab` of [`DEFAULT_PAGE_SLOTS`](Self::DEFAULT_PAGE_SLOTS)
    /// slots per page, each able to hold a value of `slot`'s layout.
    ///
    /// # Panics
    ///
    /// If a page of slots of this layout would overflow `isize`. Use
    /// [`Slab::try_with_page_slots`] to handle this case.
    #[must_use]
    pub fn new(slot: Layout) -> Self {
        Self::with_page_slots(slot, Self::DEFAULT_PAGE_SLOTS)
    }

    /// Returns a new `Slab` with `page_slots` slots per page, each able to
    /// hold a value of `slot`'s layout.
    ///
    /// # Panics
    ///
    /// If `page_slots` is zero, or if a page would overflow `isize`. Use
    /// [`Slab::try_with_page_slots`] to handle these cases.
    #[must_use]
    pub fn with_page_slots(slot: Layout, page_slots: usize) -> Self {
        match Self::try_with_page_slots(slot, page_slots) {
            Ok(slab) => slab,
            Err(error) => panic!("invalid slab geometry: {error}"),
        }
    }

    /// Returns a new `Slab` with `page_slots` slots per page, each able to
    /// hold a value of `slot`'s layout.
    ///
    /// Slots are at least large and aligned enough to hold a pointer, which
    /// the free list stores in them while they are unused.
    ///
    /// # Errors
    ///
    /// - [`SlabError::ZeroSlots`] if `page_slots` is zero.
    /// - [`SlabError::TooLarge`] or [`SlabError::Layout`] if a slot or a page
    ///   would overflow `isize`.
    pub fn try_with_page_slots(slot: Layout, page_slots: usize) -> Result<Self, SlabError> {
        if page_slots == 0 {
            return Err(SlabError::ZeroSlots);
        }

        let slot = Layout::from_size_align(
            cmp::max(slot.size(), mem::size_of::<FreeSlot>()),
            cmp::max(slot.align(), mem::align_of::<FreeSlot>()),
        )?
        .pad_to_align();
        let page_size = slot
            .size()
            .checked_mul(page_slots)
            .ok_or(SlabError::TooLarge { page_slots })?;
        let page = Layout::from_size_align(page_size, slot.align())?;

        Ok(Self {
            slot,
            page,
            page_slots,
            state: Mutex::new_with_raw_mutex(
                State {
                    free: None,
                    pages: Vec::new(),
                    // forces a page to be allocated on the first allocation.
                    next_slot: page_slots,
                    allocated: 0,
                },
                Spinlock::new(),
            ),
        })
    }

    /// Returns the layout of each slot in this slab.
    ///
    /// Any layout whose size and alignment are no greater than this one's can
    /// be allocated from the slab.
    #[must_use]
    pub fn slot_layout(&self) -> Layout {
        self.slot
    }

    /// Returns the number of slots in each page.
    #[must_use]
    pub fn page_slots(&self) -> usize {
        self.page_slots
    }

    /// Returns the number of slots currently allocated from this slab.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.state.lock().allocated
    }

    /// Returns the number of pages this slab has requested from the global
    /// allocator.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Returns the total number of slots in all of this slab's pages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pages() * self.page_slots
    }

    fn fits(&self, layout: Layout) -> bool {
        layout.size() <= self.slot.size() && layout.align() <= self.slot.align()
    }

    fn alloc_page(&self, state: &mut State) -> Result<NonNull<u8>, AllocError> {
        // Safety: `page` always has a non-zero size, since it holds at least
        // one pointer-sized slot.
        let page = NonNull::new(unsafe { raw::alloc(self.page) }).ok_or(AllocError)?;
        state.pages.push(page);
        state.next_slot = 0;
        tracing::debug!(
            pages = state.pages.len(),
            slot.size = self.slot.size(),
            slot.align = self.slot.align(),
            page_slots = self.page_slots,
            "Slab: allocated a new page"
        );
        Ok(page)
    }
}

unsafe impl NodeAlloc for Slab {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if !self.fits(layout) {
            tracing::trace!(
                ?layout,
                slot = ?self.slot,
                "Slab::allocate -> layout does not fit a slot"
            );
            return Err(AllocError);
        }

        let mut state = self.state.lock();
        let slot = match state.pop_free() {
            Some(slot) => slot,
            None => {
                let page = match state.pages.last().copied() {
                    Some(page) if state.next_slot < self.page_slots => page,
                    _ => self.alloc_page(&mut state)?,
                };
                let offset = state.next_slot * self.slot.size();
                state.next_slot += 1;
                // Safety: `next_slot` was in bounds for the page, so `offset`
                // lies within the page's allocation.
                unsafe { NonNull::new_unchecked(page.as_ptr().add(offset)) }
            }
        };
        state.allocated += 1;
        Ok(slot)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        debug_assert!(
            self.fits(layout),
            "deallocated a layout ({layout:?}) that could not have come from this slab (slot: {:?})",
            self.slot,
        );
        let mut state = self.state.lock();
        state.push_free(ptr);
        state.allocated -= 1;
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.allocated > 0 {
            tracing::warn!(
                allocated = state.allocated,
                "Slab dropped while slots were still allocated; they are now dangling"
            );
        }

        for page in state.pages.drain(..) {
            // Safety: every page was allocated with `self.page`, and is freed
            // exactly once, here.
            unsafe { raw::dealloc(page.as_ptr(), self.page) };
        }
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Slab");
        s.field("slot", &self.slot).field("page_slots", &self.page_slots);
        match self.state.try_lock() {
            Some(state) => s
                .field("allocated", &state.allocated)
                .field("pages", &state.pages.len())
                .finish(),
            None => s.field("state", &format_args!("<locked>")).finish(),
        }
    }
}

// === impl State ===

impl State {
    fn pop_free(&mut self) -> Option<NonNull<u8>> {
        let slot = self.free?;
        // Safety: every slot on the free list was written by `push_free`, and
        // is not handed out until it is popped here.
        self.free = unsafe { slot.as_ref().next };
        Some(slot.cast())
    }

    /// # Safety
    ///
    /// `ptr` must be a slot of this slab that is not currently on the free
    /// list, and nothing may access it until it is popped again.
    unsafe fn push_free(&mut self, ptr: NonNull<u8>) {
        let slot = ptr.cast::<FreeSlot>();
        slot.as_ptr().write(FreeSlot { next: self.free });
        self.free = Some(slot);
    }
}

// Safety: the raw pointers in `State` refer to pages owned by the slab, and
// are only dereferenced while the slab's lock is held.
unsafe impl Send for State {}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::{collections::HashSet, sync::Arc, thread, vec::Vec};

    fn trace_init() -> impl Drop {
        use tracing_subscriber::{filter::EnvFilter, util::SubscriberInitExt};
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("hyphae_slab=trace"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .set_default()
    }

    fn assert_aligned(ptr: NonNull<u8>, layout: Layout) {
        assert_eq!(
            ptr.as_ptr() as usize % layout.align(),
            0,
            "{ptr:p} is not aligned to {}",
            layout.align()
        );
    }

    #[test]
    fn reuses_freed_slots() {
        let _trace = trace_init();
        let layout = Layout::new::<[u64; 3]>();
        let slab = Slab::new(layout);

        let a = slab.allocate(layout).unwrap();
        let b = slab.allocate(layout).unwrap();
        assert_ne!(a, b);
        assert_eq!(slab.allocated(), 2);

        unsafe { slab.deallocate(a, layout) };
        assert_eq!(slab.allocated(), 1);

        let c = slab.allocate(layout).unwrap();
        assert_eq!(a, c, "the most recently freed slot is reused first");
        assert_eq!(slab.pages(), 1);

        unsafe {
            slab.deallocate(b, layout);
            slab.deallocate(c, layout);
        }
        assert_eq!(slab.allocated(), 0);
    }

    #[test]
    fn grows_a_page_at_a_time() {
        let _trace = trace_init();
        let layout = Layout::new::<u64>();
        let slab = Slab::with_page_slots(layout, 4);
        assert_eq!(slab.pages(), 0);
        assert_eq!(slab.capacity(), 0);

        let slots: Vec<_> = (0..5).map(|_| slab.allocate(layout).unwrap()).collect();
        assert_eq!(slab.pages(), 2);
        assert_eq!(slab.capacity(), 8);
        assert_eq!(slab.allocated(), 5);

        let distinct: HashSet<_> = slots.iter().map(|ptr| ptr.as_ptr() as usize).collect();
        assert_eq!(distinct.len(), 5);
        for &slot in &slots {
            assert_aligned(slot, slab.slot_layout());
            // the slot must be writable for its entire size.
            unsafe { slot.as_ptr().write_bytes(0xAB, slab.slot_layout().size()) };
        }

        for slot in slots {
            unsafe { slab.deallocate(slot, layout) };
        }
        assert_eq!(slab.allocated(), 0);
        assert_eq!(slab.pages(), 2, "pages are kept until the slab is dropped");
    }

    #[test]
    fn small_slots_hold_a_link() {
        let slab = Slab::new(Layout::new::<u8>());
        let slot = slab.slot_layout();
        assert!(slot.size() >= mem::size_of::<usize>());
        assert!(slot.align() >= mem::align_of::<usize>());
        assert_eq!(slot.size() % slot.align(), 0);
    }

    #[test]
    fn rejects_layouts_that_dont_fit() {
        let _trace = trace_init();
        let slab = Slab::new(Layout::new::<u64>());

        let too_big = Layout::new::<[u64; 4]>();
        assert_eq!(slab.allocate(too_big), Err(AllocError));

        let too_aligned = Layout::from_size_align(8, 64).unwrap();
        assert_eq!(slab.allocate(too_aligned), Err(AllocError));

        assert_eq!(slab.allocated(), 0);
        assert_eq!(slab.pages(), 0, "a rejected layout must not allocate a page");
    }

    #[test]
    fn invalid_geometry() {
        let layout = Layout::new::<u64>();
        assert_eq!(
            Slab::try_with_page_slots(layout, 0).unwrap_err(),
            SlabError::ZeroSlots
        );
        assert_eq!(
            Slab::try_with_page_slots(layout, usize::MAX).unwrap_err(),
            SlabError::TooLarge {
                page_slots: usize::MAX
            }
        );
        assert_eq!(
            SlabError::ZeroSlots.to_string(),
            "a slab page must contain at least one slot"
        );
    }

    #[test]
    #[should_panic(expected = "invalid slab geometry")]
    fn zero_page_slots_panics() {
        let _ = Slab::with_page_slots(Layout::new::<u64>(), 0);
    }

    #[test]
    fn concurrent_allocations_are_distinct() {
        const THREADS: usize = 4;
        const SLOTS: usize = 100;
        let _trace = trace_init();

        let layout = Layout::new::<[usize; 2]>();
        let slab = Arc::new(Slab::with_page_slots(layout, 16));
        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let slab = slab.clone();
                thread::spawn(move || {
                    (0..SLOTS)
                        .map(|_| slab.allocate(layout).unwrap().as_ptr() as usize)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for thread in threads {
            for addr in thread.join().unwrap() {
                assert!(seen.insert(addr), "slot {addr:#x} was handed out twice");
            }
        }
        assert_eq!(slab.allocated(), THREADS * SLOTS);
        assert!(slab.capacity() >= THREADS * SLOTS);

        for addr in seen {
            let ptr = NonNull::new(addr as *mut u8).unwrap();
            unsafe { slab.deallocate(ptr, layout) };
        }
        assert_eq!(slab.allocated(), 0);
    }

    #[test]
    fn debug_fmt() {
        let slab = Slab::with_page_slots(Layout::new::<u64>(), 8);
        let layout = slab.slot_layout();
        let slot = slab.allocate(layout).unwrap();
        let debug = format!("{slab:?}");
        assert!(debug.contains("allocated: 1"), "{debug}");
        assert!(debug.contains("pages: 1"), "{debug}");
        unsafe { slab.deallocate(slot, layout) };
    }

    #[test]
    fn debug_while_locked() {
        let slab = Slab::new(Layout::new::<u64>());
        let state = slab.state.lock();
        let debug = format!("{slab:?}");
        assert!(debug.contains("<locked>"), "{debug}");
        drop(state);

        let debug = format!("{slab:?}");
        assert!(debug.contains("allocated: 0"), "{debug}");
        assert!(slab.state.try_lock().is_some(), "the lock is released");
    }

    proptest! {
        #[test]
        fn tracks_live_slots(ops in prop::collection::vec(any::<bool>(), 0..256)) {
            let layout = Layout::new::<u32>();
            let slab = Slab::with_page_slots(layout, 8);
            let mut live = Vec::new();
            let mut peak = 0;

            for alloc in ops {
                if alloc || live.is_empty() {
                    let slot = slab.allocate(layout).unwrap();
                    prop_assert!(
                        !live.contains(&slot),
                        "slot {:p} handed out while still live",
                        slot
                    );
                    live.push(slot);
                    peak = cmp::max(peak, live.len());
                } else {
                    let slot = live.swap_remove(live.len() / 2);
                    unsafe { slab.deallocate(slot, layout) };
                }

                prop_assert_eq!(slab.allocated(), live.len());
                // freed slots are reused before a new page is allocated.
                prop_assert_eq!(slab.capacity(), peak.div_ceil(8) * 8);
            }

            for slot in live.drain(..) {
                unsafe { slab.deallocate(slot, layout) };
            }
            prop_assert_eq!(slab.allocated(), 0);
        }
    }
}
