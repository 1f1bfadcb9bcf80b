//! Pluggable storage for queue nodes.
//!
//! An [`MpscQueue`] never calls the global allocator itself. Every node it
//! creates (including its sentinel) is obtained from a [`NodeAlloc`], which is
//! chosen when the queue is constructed and owned by the queue for its whole
//! lifetime. By default, this is [`Global`], which forwards to the platform
//! allocator.
//!
//! [`MpscQueue`]: crate::MpscQueue
use crate::loom::alloc as raw;
use alloc::sync::Arc;
use core::{alloc::Layout, ptr::NonNull};

/// An allocator that can provide storage for the nodes of an [`MpscQueue`].
///
/// The queue requests storage for exactly one node per call to
/// [`allocate`](NodeAlloc::allocate), and returns each block to the same
/// allocator, with the same [`Layout`], exactly once. The layout of a node for
/// a given element type may be determined ahead of time using
/// [`mpsc_queue::node_layout`], so that pooled allocators can size their
/// slots.
///
/// # Concurrency
///
/// Any producer may push to a queue, so `allocate` may be called concurrently
/// from any number of threads through a shared reference. `deallocate` is only
/// ever called by the queue's single consumer (or when the queue is dropped),
/// but it may race with producers calling `allocate`.
///
/// # Safety
///
/// Implementations must ensure that:
///
/// - A successful call to `allocate` returns a pointer to a block of memory
///   that is valid for reads and writes of `layout.size()` bytes, aligned to
///   `layout.align()`, and not aliased by any other live allocation.
/// - The block stays valid until it is passed to `deallocate`.
///
/// [`MpscQueue`]: crate::MpscQueue
/// [`mpsc_queue::node_layout`]: crate::mpsc_queue::node_layout
pub unsafe trait NodeAlloc {
    /// Allocates a block of memory described by `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator cannot provide a block of this
    /// layout, either because memory is exhausted or because the layout is
    /// unsupported.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block of memory previously returned by
    /// [`allocate`](NodeAlloc::allocate).
    ///
    /// # Safety
    ///
    /// - `ptr` must have been returned by a call to `allocate` on this
    ///   allocator, with the same `layout`.
    /// - `ptr` must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The platform's general-purpose allocator.
///
/// This is the default [`NodeAlloc`] for an [`MpscQueue`].
///
/// [`MpscQueue`]: crate::MpscQueue
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Global;

/// An error indicating that a [`NodeAlloc`] could not provide storage for a
/// queue node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("failed to allocate storage for a queue node")]
pub struct AllocError;

// === impl Global ===

unsafe impl NodeAlloc for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Zero-sized blocks are never handed to the global allocator; any
            // well-aligned dangling pointer will do.
            return NonNull::new(layout.align() as *mut u8).ok_or(AllocError);
        }

        // Safety: `layout` has a non-zero size.
        let ptr = unsafe { raw::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            raw::dealloc(ptr.as_ptr(), layout)
        }
    }
}

// === impl NodeAlloc for shared references ===

unsafe impl<A: NodeAlloc + ?Sized> NodeAlloc for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

unsafe impl<A: NodeAlloc + ?Sized> NodeAlloc for Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}
