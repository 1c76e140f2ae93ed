//! `tether`: atomically reference-counted ownership handles.
//!
//! `tether` provides three ways of owning a heap resource:
//!
//! - [`SharedHandle`]: shared, strong ownership. Clones bump a strong count;
//!   the resource is released exactly once, when that count drops to zero.
//! - [`WeakHandle`]: a non-owning observer that can be locked into a
//!   temporary [`SharedHandle`] while the resource is still alive.
//! - [`UniqueHandle`]: exclusive ownership with a reusable custom deleter.
//!
//! # Architecture
//!
//! Shared and weak handles point at a single control block allocation that
//! holds both counts, the deleter and the resource. The `block` module
//! documents its layout and the memory orderings used. There are no locks;
//! every count update is an atomic instruction and upgrading a weak handle is
//! a single compare-and-swap loop.
//!
//! # Reference cycles
//!
//! Nothing here detects cycles. Two resources holding strong handles to each
//! other are never released. Any bidirectional relationship must hold one of
//! its directions as a [`WeakHandle`]:
//!
//! ```rust
//! use std::sync::Mutex;
//! use tether::{SharedHandle, WeakHandle};
//!
//! struct Team {
//!     lead: Mutex<WeakHandle<Member>>,
//! }
//!
//! struct Member {
//!     team: SharedHandle<Team>,
//! }
//!
//! let team = SharedHandle::new(Team { lead: Mutex::new(WeakHandle::empty()) });
//! let member = SharedHandle::new(Member { team: team.clone() });
//! if let Some(t) = team.get() {
//!     *t.lead.lock().unwrap() = member.downgrade();
//! }
//!
//! let observer = team.downgrade();
//! drop(team);
//! drop(member);
//! assert!(observer.expired());
//! ```
//!
//! # Features
//!
//! - `block-stats` (default): per-thread control block counters in [`stats`].
//! - `log` (default): control block lifecycle events at trace level through
//!   `tether-log`.

#[cfg(feature = "log")]
macro_rules! lifecycle {
    ($($arg:tt)*) => {
        tether_log::trace!($($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! lifecycle {
    ($($arg:tt)*) => {};
}

pub(crate) use lifecycle;

mod block;
pub mod error;
pub mod shared;
pub mod stats;
pub mod unique;
pub mod weak;

pub use error::{Error, Result};
pub use shared::SharedHandle;
pub use unique::UniqueHandle;
pub use weak::WeakHandle;

#[cfg(feature = "block-stats")]
pub use stats::{BlockStats, block_stats, reset_block_stats};
