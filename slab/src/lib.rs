//! A pooled slab allocator for [`hyphae`] queue nodes.
//!
//! A [`Slab`] hands out fixed-size slots carved from larger pages obtained
//! from the global allocator. Slots returned to the slab are kept on a free
//! list and reused before any new memory is requested, so a queue whose length
//! stays bounded stops touching the global allocator once it has warmed up.
//!
//! ```
//! use hyphae::MpscQueue;
//! use hyphae_slab::Slab;
//!
//! let slab = Slab::for_queue::<usize>();
//! let q = MpscQueue::new_in(&slab);
//!
//! for i in 0..10 {
//!     q.push(i);
//!     assert_eq!(q.pull(), Some(i));
//! }
//!
//! drop(q);
//! assert_eq!(slab.allocated(), 0);
//! assert_eq!(slab.pages(), 1);
//! ```
#![cfg_attr(not(test), no_std)]
#![warn(missing_debug_implementations)]

extern crate alloc;

mod slab;

pub use self::slab::{Slab, SlabError};
