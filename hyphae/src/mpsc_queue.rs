//! An unbounded, lock-free multi-producer, single-consumer queue.
//!
//! This is the Michael-Scott linked queue, specialized for a single consumer.
//! The queue is a singly-linked list of heap-allocated nodes running from the
//! *tail* (the oldest node) to the *head* (the newest node). The tail is
//! always a *sentinel* node whose value has already been taken (or which never
//! had one), so the queue is non-empty exactly when the sentinel has a
//! successor.
//!
//! - **Producers** append by allocating a node, atomically swapping it into
//!   the head pointer, and then linking the previous head to it. The swap is
//!   the only point where producers contend, and it never fails, so pushing
//!   never retries.
//! - **The consumer** takes the value out of the sentinel's successor, makes
//!   that node the new sentinel, and frees the old one. Because only one
//!   thread ever frees nodes, and a producer touches the previous head for the
//!   last time when it links it, no hazard pointers or epochs are needed to
//!   reclaim memory.
//!
//! Between the swap and the link, a freshly pushed node is the head of the
//! queue but is not yet reachable from the tail. A pull that runs in that
//! window reports the queue as empty rather than waiting for the producer to
//! finish; the value becomes visible to the next pull once it is linked.
//!
//! # Examples
//!
//! ```
//! use hyphae::MpscQueue;
//! use std::{sync::Arc, thread};
//!
//! let q = Arc::new(MpscQueue::new());
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|thread| {
//!         let q = q.clone();
//!         thread::spawn(move || {
//!             for i in 0..10 {
//!                 q.push(thread * 10 + i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for producer in producers {
//!     producer.join().unwrap();
//! }
//!
//! let mut values: Vec<i32> = q.consume().collect();
//! values.sort();
//! assert_eq!(values, (0..40).collect::<Vec<_>>());
//! ```
use crate::{
    allocator::{AllocError, Global, NodeAlloc},
    loom::{
        atomic::{AtomicBool, AtomicPtr, Ordering::*},
        cell::UnsafeCell,
    },
    util::CachePadded,
};
use alloc::{alloc::handle_alloc_error, sync::Arc};
use core::{
    alloc::Layout,
    fmt,
    marker::PhantomData,
    mem::MaybeUninit,
    ptr::{self, NonNull},
};

/// An unbounded, lock-free multi-producer, single-consumer queue.
///
/// Values may be [pushed](MpscQueue::push) from any number of threads
/// concurrently. Only one thread may remove values at a time. The safe
/// consumer-side APIs ([`pull`], [`try_pull`], and the [`Consumer`] handles)
/// enforce this at runtime; the unsafe [`pull_unchecked`] and
/// [`clear_unchecked`] methods leave it to the caller.
///
/// Nodes are allocated from the [`NodeAlloc`] `A`, which defaults to the
/// platform's [`Global`] allocator.
///
/// See the [module-level documentation](self) for details on the algorithm.
///
/// [`pull`]: MpscQueue::pull
/// [`try_pull`]: MpscQueue::try_pull
/// [`pull_unchecked`]: MpscQueue::pull_unchecked
/// [`clear_unchecked`]: MpscQueue::clear_unchecked
pub struct MpscQueue<T, A: NodeAlloc = Global> {
    /// The most recently pushed node. This is accessed by every producer.
    head: CachePadded<AtomicPtr<Node<T>>>,

    /// The current sentinel node. This is accessed only when pulling.
    tail: CachePadded<AtomicPtr<Node<T>>>,

    /// Does a consumer currently hold the right to pull from the queue?
    has_consumer: CachePadded<AtomicBool>,

    alloc: A,

    _values: PhantomData<T>,
}

/// A handle that holds the exclusive right to pull values from an
/// [`MpscQueue`].
///
/// This can be used when one thread wishes to pull many values at a time, to
/// avoid claiming and releasing the consumer side of the queue on every
/// [`MpscQueue::pull`] call. Dropping the handle releases the right to pull.
///
/// A `Consumer` is also an [`Iterator`] which pulls values until the queue is
/// empty. Because producers may push more values at any time, the iterator is
/// not fused: calling [`next`](Iterator::next) after it has returned `None`
/// may return more values.
///
/// This type is returned by the [`MpscQueue::consume`] and
/// [`MpscQueue::try_consume`] methods. An owned variant which holds the queue
/// in an [`Arc`] is also available, as [`OwnedConsumer`].
pub struct Consumer<'q, T, A: NodeAlloc = Global> {
    q: &'q MpscQueue<T, A>,
}

/// An owned handle that holds the exclusive right to pull values from an
/// [`MpscQueue`] stored in an [`Arc`].
///
/// This is similar to the [`Consumer`] type, but the queue is stored in an
/// [`Arc`] rather than borrowed. This allows a single `OwnedConsumer` to be
/// moved into a consumer thread and used indefinitely.
///
/// This type is returned by the [`MpscQueue::consume_owned`] and
/// [`MpscQueue::try_consume_owned`] methods.
pub struct OwnedConsumer<T, A: NodeAlloc = Global> {
    q: Arc<MpscQueue<T, A>>,
}

/// Returned by [`MpscQueue::try_push`] when the queue's allocator could not
/// provide a node for the pushed value.
///
/// The value that could not be pushed is handed back, and may be recovered
/// using [`PushError::into_inner`].
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("failed to allocate a queue node for a pushed value")]
pub struct PushError<T> {
    value: T,
    #[source]
    error: AllocError,
}

/// Errors returned by [`MpscQueue::try_pull`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TryPullError {
    /// No values are currently linked into the queue.
    #[error("the queue is empty")]
    Empty,
    /// Another thread currently holds the right to pull from the queue.
    #[error("another consumer is pulling from the queue")]
    Busy,
}

struct Node<T> {
    /// The next (newer) node in the queue, or null if this is the newest node.
    next: AtomicPtr<Node<T>>,

    /// Initialized by the producer which allocated this node, and taken by
    /// the consumer. A sentinel node never holds a value.
    value: UnsafeCell<MaybeUninit<T>>,

    /// Used for debug mode consistency checking only.
    #[cfg(debug_assertions)]
    filled: AtomicBool,
}

/// Returns the [`Layout`] of a single node in an [`MpscQueue`] of `T`s.
///
/// Every block an [`MpscQueue<T, A>`] requests from its allocator has this
/// layout, regardless of `A`. This can be used to size a pooled
/// [`NodeAlloc`] for a particular queue.
#[must_use]
pub fn node_layout<T>() -> Layout {
    Layout::new::<Node<T>>()
}

// === impl MpscQueue ===

impl<T> MpscQueue<T> {
    /// Returns a new, empty `MpscQueue` whose nodes are allocated by the
    /// [`Global`] allocator.
    ///
    /// # Panics
    ///
    /// Aborts the process (via [`handle_alloc_error`]) if the sentinel node
    /// cannot be allocated.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T, A: NodeAlloc> MpscQueue<T, A> {
    /// Returns a new, empty `MpscQueue` whose nodes are allocated by `alloc`.
    ///
    /// # Panics
    ///
    /// Aborts the process (via [`handle_alloc_error`]) if the sentinel node
    /// cannot be allocated. Use [`MpscQueue::try_new_in`] to handle
    /// allocation failure instead.
    #[must_use]
    pub fn new_in(alloc: A) -> Self {
        match Self::try_new_in(alloc) {
            Ok(q) => q,
            Err(_) => handle_alloc_error(node_layout::<T>()),
        }
    }

    /// Returns a new, empty `MpscQueue` whose nodes are allocated by `alloc`,
    /// or an error if the sentinel node could not be allocated.
    pub fn try_new_in(alloc: A) -> Result<Self, AllocError> {
        let sentinel = allocate_node::<T>(&alloc)?;
        unsafe {
            // Safety: the block was just allocated with the layout of a node.
            sentinel.as_ptr().write(Node::sentinel());
        }
        let ptr = sentinel.as_ptr();

        Ok(Self {
            head: CachePadded(AtomicPtr::new(ptr)),
            tail: CachePadded(AtomicPtr::new(ptr)),
            has_consumer: CachePadded(AtomicBool::new(false)),
            alloc,
            _values: PhantomData,
        })
    }

    /// Returns a reference to the allocator used by this queue.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Pushes `value` to the back of the queue.
    ///
    /// This never blocks, and may be called from any number of threads
    /// concurrently.
    ///
    /// # Panics
    ///
    /// Aborts the process (via [`handle_alloc_error`]) if the queue's
    /// allocator cannot provide a node. Use [`MpscQueue::try_push`] to handle
    /// allocation failure instead.
    #[inline]
    pub fn push(&self, value: T) {
        if self.try_push(value).is_err() {
            handle_alloc_error(node_layout::<T>())
        }
    }

    /// Pushes `value` to the back of the queue, or returns it in a
    /// [`PushError`] if the queue's allocator cannot provide a node.
    ///
    /// This never blocks, and may be called from any number of threads
    /// concurrently.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let node = self.prepare(value)?;
        let prev = self.swap_head(node);
        unsafe {
            // Safety: `prev` is the node that `node` replaced as the head.
            Self::link(prev, node);
        }
        Ok(())
    }

    /// Allocates a new, unlinked node holding `value`.
    fn prepare(&self, value: T) -> Result<NonNull<Node<T>>, PushError<T>> {
        let node = match allocate_node::<T>(&self.alloc) {
            Ok(node) => node,
            Err(error) => return Err(PushError { value, error }),
        };
        unsafe {
            // Safety: the block was just allocated with the layout of a node.
            node.as_ptr().write(Node::new(value));
        }
        Ok(node)
    }

    /// Makes `node` the head of the queue, returning the previous head.
    ///
    /// Until the previous head is linked to `node`, the consumer cannot reach
    /// `node`, or any node pushed after it.
    #[inline]
    fn swap_head(&self, node: NonNull<Node<T>>) -> NonNull<Node<T>> {
        let prev = self.head.swap(node.as_ptr(), AcqRel);
        trace!(?node, ?prev, "MpscQueue::push");
        unsafe {
            // Safety: in release mode, we don't null check `prev`. This is
            // because the head is never a null pointer, due to the presence
            // of the sentinel node.
            non_null(prev)
        }
    }

    /// # Safety
    ///
    /// `prev` must have been returned by the [`swap_head`](Self::swap_head)
    /// call that made `node` the head of the queue, and `link` must be called
    /// exactly once for that pair.
    #[inline]
    unsafe fn link(prev: NonNull<Node<T>>, node: NonNull<Node<T>>) {
        // `prev` cannot have been freed yet: the consumer only frees a node
        // after observing its `next` pointer, which is what we store here.
        prev.as_ref().next.store(node.as_ptr(), Release);
    }

    /// Removes the value at the front of the queue, without waiting.
    ///
    /// # Returns
    ///
    /// - `Some(T)` if a value was pulled from the queue
    /// - `None` if the queue is empty, or if another thread currently holds
    ///   the right to pull from the queue
    ///
    /// [`MpscQueue::try_pull`] distinguishes between these two cases.
    #[inline]
    pub fn pull(&self) -> Option<T> {
        self.try_pull().ok()
    }

    /// Tries to remove the value at the front of the queue, without waiting.
    ///
    /// A value whose producer is still in the middle of [`push`] may not be
    /// visible yet, in which case the queue is reported as empty.
    ///
    /// # Returns
    ///
    /// - `Ok(T)` if a value was pulled from the queue
    /// - [`TryPullError::Empty`] if there are no values in the queue
    /// - [`TryPullError::Busy`] if another thread currently holds the right
    ///   to pull from the queue
    ///
    /// [`push`]: MpscQueue::push
    pub fn try_pull(&self) -> Result<T, TryPullError> {
        if !self.try_lock_consumer() {
            return Err(TryPullError::Busy);
        }

        let value = unsafe {
            // Safety: the `has_consumer` flag ensures mutual exclusion of
            // consumers.
            self.pull_unchecked()
        };

        self.unlock_consumer();
        value.ok_or(TryPullError::Empty)
    }

    /// Removes the value at the front of the queue, without checking whether
    /// any other thread is pulling from the queue.
    ///
    /// Returns `None` if the queue is empty.
    ///
    /// # Safety
    ///
    /// This is a multi-producer, *single-consumer* queue. Only one thread may
    /// call `pull_unchecked` or [`clear_unchecked`] at a time, and not while a
    /// [`Consumer`] or [`OwnedConsumer`] exists on another thread. If calls
    /// are made from different threads, they must be synchronized with each
    /// other.
    ///
    /// [`clear_unchecked`]: MpscQueue::clear_unchecked
    pub unsafe fn pull_unchecked(&self) -> Option<T> {
        // Only the consumer ever stores to the tail, so no ordering is needed
        // to load it.
        let tail = non_null(self.tail.load(Relaxed));

        // Null either when the queue is empty, or when the producer of the
        // next node has swapped it in but not yet linked it. Either way, the
        // queue is empty from the consumer's perspective.
        let next = NonNull::new(tail.as_ref().next.load(Acquire))?;

        let value = next.as_ref().take_value();
        self.tail.store(next.as_ptr(), Release);
        trace!(sentinel = ?next, freed = ?tail, "MpscQueue::pull");

        self.free_node(tail);
        Some(value)
    }

    /// Drops every value currently linked into the queue, without returning
    /// them.
    ///
    /// Values whose producers have not finished pushing are not removed.
    /// Clearing an empty queue does nothing.
    pub fn clear(&mut self) {
        unsafe {
            // Safety: `&mut self` guarantees that no consumer exists.
            self.clear_unchecked()
        }
    }

    /// Drops every value currently linked into the queue, without checking
    /// whether any other thread is pulling from the queue.
    ///
    /// # Safety
    ///
    /// The same single-consumer contract as [`pull_unchecked`] applies.
    ///
    /// [`pull_unchecked`]: MpscQueue::pull_unchecked
    pub unsafe fn clear_unchecked(&self) {
        trace!("MpscQueue::clear");
        while self.pull_unchecked().is_some() {}
    }

    /// Returns a [`Consumer`] handle that reserves the exclusive right to
    /// pull values from the queue until it is dropped.
    ///
    /// # Panics
    ///
    /// If another [`Consumer`] or [`OwnedConsumer`] currently exists, or
    /// another thread is pulling from the queue. This method never waits.
    #[track_caller]
    #[must_use]
    pub fn consume(&self) -> Consumer<'_, T, A> {
        match self.try_consume() {
            Some(consumer) => consumer,
            None => panic!("an `MpscQueue` may only have one consumer at a time"),
        }
    }

    /// Attempts to reserve a [`Consumer`] handle that holds the exclusive
    /// right to pull values from the queue until it is dropped.
    ///
    /// If another thread holds the right to pull, this returns `None`
    /// instead.
    #[must_use]
    pub fn try_consume(&self) -> Option<Consumer<'_, T, A>> {
        self.try_lock_consumer().then(|| Consumer { q: self })
    }

    /// Returns an [`OwnedConsumer`] handle that reserves the exclusive right
    /// to pull values from the queue until it is dropped.
    ///
    /// # Panics
    ///
    /// If another [`Consumer`] or [`OwnedConsumer`] currently exists, or
    /// another thread is pulling from the queue. This method never waits.
    #[track_caller]
    #[must_use]
    pub fn consume_owned(self: Arc<Self>) -> OwnedConsumer<T, A> {
        match self.try_consume_owned() {
            Some(consumer) => consumer,
            None => panic!("an `MpscQueue` may only have one consumer at a time"),
        }
    }

    /// Attempts to reserve an [`OwnedConsumer`] handle that holds the
    /// exclusive right to pull values from the queue until it is dropped.
    ///
    /// If another thread holds the right to pull, this returns `None`
    /// instead.
    #[must_use]
    pub fn try_consume_owned(self: Arc<Self>) -> Option<OwnedConsumer<T, A>> {
        self.try_lock_consumer().then(|| OwnedConsumer { q: self })
    }

    /// The acquire/release pair on the `has_consumer` flag also orders the
    /// tail accesses of consecutive consumers running on different threads.
    #[inline]
    fn try_lock_consumer(&self) -> bool {
        self.has_consumer
            .compare_exchange(false, true, AcqRel, Acquire)
            .is_ok()
    }

    #[inline]
    fn unlock_consumer(&self) {
        self.has_consumer.store(false, Release);
    }

    /// # Safety
    ///
    /// `node` must have been allocated by this queue, must be unreachable
    /// from both the head and the tail, and must not hold a value.
    unsafe fn free_node(&self, node: NonNull<Node<T>>) {
        #[cfg(debug_assertions)]
        debug_assert!(
            !node.as_ref().filled.load(Relaxed),
            "freed a queue node that still holds a value! this is a bug in `hyphae`!"
        );
        ptr::drop_in_place(node.as_ptr());
        self.alloc.deallocate(node.cast(), node_layout::<T>());
    }
}

impl<T, A: NodeAlloc> Drop for MpscQueue<T, A> {
    fn drop(&mut self) {
        /// Drains whatever is left and frees the sentinel. This also runs if
        /// dropping one of the queue's values panics, so that the remaining
        /// nodes are not leaked.
        struct Teardown<'q, T, A: NodeAlloc>(&'q MpscQueue<T, A>);

        impl<T, A: NodeAlloc> Drop for Teardown<'_, T, A> {
            fn drop(&mut self) {
                let q = self.0;
                unsafe {
                    // Safety: the queue is being dropped, so we have exclusive
                    // access to it.
                    q.clear_unchecked();
                }

                let sentinel = q.tail.load(Relaxed);
                debug_assert_eq!(
                    sentinel,
                    q.head.load(Relaxed),
                    "a cleared queue must contain only its sentinel node"
                );
                unsafe {
                    // Safety: the sentinel never holds a value, and once the
                    // queue is gone, nothing can reach it.
                    q.free_node(non_null(sentinel));
                }
            }
        }

        let teardown = Teardown(self);
        unsafe {
            // Safety: because `Drop` is called with `&mut self`, we have
            // exclusive ownership over the queue, so there are no other
            // consumers, and every push has been linked. Each pull leaves the
            // queue consistent before the value is dropped, so `teardown` can
            // resume the drain if that drop panics.
            teardown.0.clear_unchecked();
        }
    }
}

impl<T, A> fmt::Debug for MpscQueue<T, A>
where
    A: NodeAlloc + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscQueue")
            .field("head", &format_args!("{:p}", self.head.load(Acquire)))
            .field("tail", &format_args!("{:p}", self.tail.load(Acquire)))
            .field("has_consumer", &self.has_consumer.load(Acquire))
            .field("alloc", &self.alloc)
            .finish()
    }
}

impl<T, A> Default for MpscQueue<T, A>
where
    A: NodeAlloc + Default,
{
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

// Values are moved from producer threads to the consumer thread, but never
// shared, so `T: Send` is sufficient. Producers allocate through a shared
// reference to the allocator.
unsafe impl<T: Send, A: NodeAlloc + Send> Send for MpscQueue<T, A> {}
unsafe impl<T: Send, A: NodeAlloc + Sync> Sync for MpscQueue<T, A> {}

// === impl Consumer ===

impl<T, A: NodeAlloc> Consumer<'_, T, A> {
    /// Removes the value at the front of the queue, or returns `None` if the
    /// queue is empty. This never waits.
    #[inline]
    pub fn pull(&mut self) -> Option<T> {
        debug_assert!(self.q.has_consumer.load(Acquire));
        unsafe {
            // Safety: we have reserved exclusive access to the queue.
            self.q.pull_unchecked()
        }
    }

    /// Drops every value currently linked into the queue.
    #[inline]
    pub fn clear(&mut self) {
        debug_assert!(self.q.has_consumer.load(Acquire));
        unsafe {
            // Safety: we have reserved exclusive access to the queue.
            self.q.clear_unchecked()
        }
    }
}

impl<T, A: NodeAlloc> Iterator for Consumer<'_, T, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.pull()
    }
}

impl<T, A: NodeAlloc> Drop for Consumer<'_, T, A> {
    fn drop(&mut self) {
        self.q.unlock_consumer();
    }
}

impl<T, A: NodeAlloc> fmt::Debug for Consumer<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("head", &format_args!("{:p}", self.q.head.load(Acquire)))
            .field("tail", &format_args!("{:p}", self.q.tail.load(Relaxed)))
            .finish()
    }
}

// === impl OwnedConsumer ===

impl<T, A: NodeAlloc> OwnedConsumer<T, A> {
    /// Removes the value at the front of the queue, or returns `None` if the
    /// queue is empty. This never waits.
    #[inline]
    pub fn pull(&mut self) -> Option<T> {
        debug_assert!(self.q.has_consumer.load(Acquire));
        unsafe {
            // Safety: we have reserved exclusive access to the queue.
            self.q.pull_unchecked()
        }
    }

    /// Drops every value currently linked into the queue.
    #[inline]
    pub fn clear(&mut self) {
        debug_assert!(self.q.has_consumer.load(Acquire));
        unsafe {
            // Safety: we have reserved exclusive access to the queue.
            self.q.clear_unchecked()
        }
    }

    /// Returns the queue this handle consumes from.
    ///
    /// This may be used to push values or to hand out new producer clones of
    /// the queue.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<MpscQueue<T, A>> {
        &self.q
    }
}

impl<T, A: NodeAlloc> Iterator for OwnedConsumer<T, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.pull()
    }
}

impl<T, A: NodeAlloc> Drop for OwnedConsumer<T, A> {
    fn drop(&mut self) {
        self.q.unlock_consumer();
    }
}

impl<T, A: NodeAlloc> fmt::Debug for OwnedConsumer<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedConsumer")
            .field("head", &format_args!("{:p}", self.q.head.load(Acquire)))
            .field("tail", &format_args!("{:p}", self.q.tail.load(Relaxed)))
            .finish()
    }
}

// === impl PushError ===

impl<T> PushError<T> {
    /// Returns the value that could not be pushed.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns the allocation error that prevented the push.
    #[must_use]
    pub fn alloc_error(&self) -> AllocError {
        self.error
    }
}

// === impl Node ===

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: UnsafeCell::new(MaybeUninit::new(value)),
            #[cfg(debug_assertions)]
            filled: AtomicBool::new(true),
        }
    }

    fn sentinel() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: UnsafeCell::new(MaybeUninit::uninit()),
            #[cfg(debug_assertions)]
            filled: AtomicBool::new(false),
        }
    }

    /// # Safety
    ///
    /// Only the consumer may call this, at most once per node, and only after
    /// observing the link to this node with `Acquire` ordering.
    unsafe fn take_value(&self) -> T {
        #[cfg(debug_assertions)]
        {
            let was_filled = self.filled.swap(false, Relaxed);
            debug_assert!(
                was_filled,
                "took a value out of an empty queue node! this is a bug in `hyphae`!"
            );
        }
        self.value.with_mut(|value| (*value).assume_init_read())
    }
}

fn allocate_node<T>(alloc: &impl NodeAlloc) -> Result<NonNull<Node<T>>, AllocError> {
    alloc.allocate(node_layout::<T>()).map(NonNull::cast)
}

#[cfg(debug_assertions)]
#[track_caller]
#[inline(always)]
unsafe fn non_null<T>(ptr: *mut T) -> NonNull<T> {
    NonNull::new(ptr).expect(
        "/!\\ constructed a `NonNull` from a null pointer! /!\\ \n\
        in release mode, this would have called `NonNull::new_unchecked`, \
        violating the `NonNull` invariant! this is a bug in `hyphae`!",
    )
}

#[cfg(not(debug_assertions))]
#[inline(always)]
unsafe fn non_null<T>(ptr: *mut T) -> NonNull<T> {
    NonNull::new_unchecked(ptr)
}

#[cfg(all(loom, test))]
mod loom;
