//! Non-owning observers of a shared resource.
//!
//! A [`WeakHandle`] keeps the control block alive but never the resource.
//! To use the resource, [`WeakHandle::lock`] it: that produces a
//! [`SharedHandle`] if at least one strong handle still exists, and an empty
//! one otherwise. The check and the increment are one atomic step, so a
//! resource whose last strong handle is being dropped on another thread is
//! never brought back.
//!
//! Weak handles are the way to express back-references. Two entities that
//! hold strong handles to each other keep each other alive forever; making
//! one direction weak lets the pair be freed.
//!
//! # Example
//!
//! ```rust
//! use tether::{SharedHandle, WeakHandle};
//!
//! let owner = SharedHandle::new("P1");
//! let observer = WeakHandle::new(&owner);
//! assert_eq!(owner.use_count(), 1);
//!
//! if let Some(name) = observer.lock().get() {
//!     assert_eq!(*name, "P1");
//! }
//!
//! drop(owner);
//! assert!(observer.expired());
//! assert!(observer.lock().is_empty());
//! ```

use crate::block::{self, RawHandle};
use crate::shared::SharedHandle;
use std::fmt;
use std::marker::PhantomData;
use std::mem;

/// A nullable, non-owning handle to a shared resource.
pub struct WeakHandle<T> {
    raw: Option<RawHandle<T>>,
    _observes: PhantomData<T>,
}

impl<T> WeakHandle<T> {
    /// Creates a weak handle observing `shared`'s resource.
    ///
    /// Same as [`SharedHandle::downgrade`].
    #[must_use]
    pub fn new(shared: &SharedHandle<T>) -> Self {
        shared.downgrade()
    }

    /// Creates a weak handle that observes nothing. It is always expired.
    #[must_use]
    pub const fn empty() -> Self {
        WeakHandle {
            raw: None,
            _observes: PhantomData,
        }
    }

    /// Wraps a raw handle whose weak reference the caller hands over.
    pub(crate) fn from_raw(raw: RawHandle<T>) -> Self {
        WeakHandle {
            raw: Some(raw),
            _observes: PhantomData,
        }
    }

    /// Returns `true` if this handle observes no control block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Tries to obtain a strong handle to the resource.
    ///
    /// Returns an empty [`SharedHandle`] when the resource is gone; counts
    /// are not modified in that case.
    #[must_use]
    pub fn lock(&self) -> SharedHandle<T> {
        match self.raw {
            // SAFETY: our weak reference keeps the block alive.
            Some(raw) if unsafe { raw.header() }.inc_strong_if_nonzero() => {
                SharedHandle::from_raw(raw)
            }
            _ => SharedHandle::empty(),
        }
    }

    /// Returns `true` once no strong handle to the resource remains.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Number of strong handles to the resource, 0 when expired or empty.
    #[must_use]
    pub fn use_count(&self) -> usize {
        // SAFETY: our weak reference keeps the block alive.
        self.raw
            .as_ref()
            .map_or(0, |raw| unsafe { raw.header() }.strong_count())
    }

    /// Number of weak handles to the resource, including this one.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        // SAFETY: our weak reference keeps the block alive.
        self.raw
            .as_ref()
            .map_or(0, |raw| unsafe { raw.header() }.weak_count())
    }

    /// Stops observing and becomes empty.
    ///
    /// If this was the last reference of any kind, the control block is
    /// freed.
    pub fn reset(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the weak reference we owned is consumed here.
            unsafe { block::release_weak(raw.block) };
        }
    }

    /// Moves the observation out of `self`, leaving it empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns `true` if both handles observe the same control block, or
    /// both are empty.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.raw, &other.raw) {
            (Some(a), Some(b)) => a.same_block(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match self.raw {
            Some(raw) => {
                // SAFETY: our weak reference keeps the block alive.
                unsafe { raw.header() }.inc_weak();
                Self::from_raw(raw)
            }
            None => Self::empty(),
        }
    }
}

impl<T> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<&SharedHandle<T>> for WeakHandle<T> {
    fn from(shared: &SharedHandle<T>) -> Self {
        shared.downgrade()
    }
}

impl<T> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("expired", &self.expired())
            .field("use_count", &self.use_count())
            .field("weak_count", &self.weak_count())
            .finish()
    }
}

// SAFETY: a weak handle can be locked into a SharedHandle<T> on any thread,
// so it carries the same requirements.
unsafe impl<T: Send + Sync> Send for WeakHandle<T> {}

// SAFETY: &WeakHandle<T> only allows atomic count operations and locking.
unsafe impl<T: Send + Sync> Sync for WeakHandle<T> {}
