//! Strong, shared ownership of a resource.
//!
//! A [`SharedHandle`] keeps its resource alive. Cloning it adds one to the
//! strong count, dropping or resetting it subtracts one, and the handle that
//! brings the count to zero runs the deleter. The handle may also be empty,
//! in which case it owns nothing and [`SharedHandle::get`] returns `None`.
//!
//! # Thread Safety
//!
//! `SharedHandle<T>` is `Send + Sync` when `T: Send + Sync`. All count
//! updates are atomic, so clones may be created and dropped on any thread.
//! The deleter runs on whichever thread drops the last strong handle.
//!
//! # Example
//!
//! ```rust
//! use tether::SharedHandle;
//!
//! let a = SharedHandle::new(String::from("test1"));
//! assert_eq!(a.use_count(), 1);
//!
//! {
//!     let b = a.clone();
//!     assert_eq!(a.use_count(), 2);
//!     assert_eq!(b.get().map(String::as_str), Some("test1"));
//! }
//!
//! assert_eq!(a.use_count(), 1);
//! ```

use crate::block::{self, Block, DeleterRelease, DropRelease, RawHandle, Release};
use crate::error::{Error, Result};
use crate::weak::WeakHandle;
use std::alloc;
use std::fmt;
use std::marker::PhantomData;
use std::mem;

/// A nullable, reference-counted strong handle.
pub struct SharedHandle<T> {
    raw: Option<RawHandle<T>>,
    _owns: PhantomData<T>,
}

impl<T> SharedHandle<T> {
    /// Creates an empty handle that owns nothing.
    #[must_use]
    pub const fn empty() -> Self {
        SharedHandle {
            raw: None,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of `value` with the default deleter (`drop`).
    ///
    /// Allocation failure is fatal, as with `Box::new`. Use
    /// [`SharedHandle::try_new`] to observe it instead.
    pub fn new(value: T) -> Self {
        Self::from_release_or_abort(value, DropRelease)
    }

    /// Fallible form of [`SharedHandle::new`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the control block cannot be
    /// allocated. The value is dropped in that case.
    pub fn try_new(value: T) -> Result<Self> {
        Self::from_release(value, DropRelease)
    }

    /// Takes ownership of `value`, releasing it through `deleter` once the
    /// last strong handle is gone.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use tether::SharedHandle;
    ///
    /// let closed = Arc::new(AtomicBool::new(false));
    /// let flag = closed.clone();
    /// let socket = SharedHandle::with_deleter(7u32, move |fd| {
    ///     assert_eq!(fd, 7);
    ///     flag.store(true, Ordering::SeqCst);
    /// });
    ///
    /// drop(socket);
    /// assert!(closed.load(Ordering::SeqCst));
    /// ```
    pub fn with_deleter<D>(value: T, deleter: D) -> Self
    where
        D: FnOnce(T) + Send + 'static,
    {
        Self::from_release_or_abort(value, DeleterRelease(deleter))
    }

    /// Fallible form of [`SharedHandle::with_deleter`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the control block cannot be
    /// allocated. The deleter has already been run on `value` in that case.
    pub fn try_with_deleter<D>(value: T, deleter: D) -> Result<Self>
    where
        D: FnOnce(T) + Send + 'static,
    {
        Self::from_release(value, DeleterRelease(deleter))
    }

    pub(crate) fn from_release<R: Release<T>>(value: T, release: R) -> Result<Self> {
        let raw = RawHandle::allocate(value, release)?;
        Ok(Self::from_raw(raw))
    }

    /// Like `from_release`, reporting allocation failure through
    /// [`alloc::handle_alloc_error`] with the layout that failed.
    pub(crate) fn from_release_or_abort<R: Release<T>>(value: T, release: R) -> Self {
        match Self::from_release(value, release) {
            Ok(handle) => handle,
            Err(_) => alloc::handle_alloc_error(Block::<T, R>::layout()),
        }
    }

    /// Wraps a raw handle whose strong reference the caller hands over.
    pub(crate) fn from_raw(raw: RawHandle<T>) -> Self {
        SharedHandle {
            raw: Some(raw),
            _owns: PhantomData,
        }
    }

    /// Returns `true` if the handle owns nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Borrows the resource, or `None` for an empty handle.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: our strong reference keeps the value alive for as long as
        // the returned borrow of `self`.
        self.raw.as_ref().map(|raw| unsafe { raw.value.as_ref() })
    }

    /// Borrows the resource, treating an empty handle as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHandle`] if the handle owns nothing.
    pub fn try_get(&self) -> Result<&T> {
        self.get().ok_or(Error::EmptyHandle)
    }

    /// Number of strong handles sharing this resource, 0 when empty.
    ///
    /// The value may be stale by the time it is read when other threads hold
    /// clones. Use it for diagnostics, not for synchronization.
    #[must_use]
    pub fn use_count(&self) -> usize {
        // SAFETY: we hold a strong reference.
        self.raw
            .as_ref()
            .map_or(0, |raw| unsafe { raw.header() }.strong_count())
    }

    /// Number of weak handles observing this resource, 0 when empty.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        // SAFETY: we hold a strong reference.
        self.raw
            .as_ref()
            .map_or(0, |raw| unsafe { raw.header() }.weak_count())
    }

    /// Creates a weak handle observing the same resource.
    ///
    /// Downgrading an empty handle gives an empty (expired) weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakHandle<T> {
        match self.raw {
            Some(raw) => {
                // SAFETY: we hold a strong reference.
                unsafe { raw.header() }.inc_weak();
                WeakHandle::from_raw(raw)
            }
            None => WeakHandle::empty(),
        }
    }

    /// Releases this handle's strong reference and becomes empty.
    ///
    /// If this was the last strong handle the deleter runs before `reset`
    /// returns.
    pub fn reset(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the strong reference we owned is consumed here.
            unsafe { block::release_strong(raw.block) };
        }
    }

    /// Releases the current resource and takes ownership of `value`.
    ///
    /// The new control block is allocated before the old reference is
    /// released.
    pub fn reset_with(&mut self, value: T) {
        *self = Self::new(value);
    }

    /// Like [`SharedHandle::reset_with`] with a custom deleter.
    pub fn reset_with_deleter<D>(&mut self, value: T, deleter: D)
    where
        D: FnOnce(T) + Send + 'static,
    {
        *self = Self::with_deleter(value, deleter);
    }

    /// Fallible form of [`SharedHandle::reset_with`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the new control block cannot be
    /// allocated. `self` is left untouched and `value` is dropped.
    pub fn try_reset_with(&mut self, value: T) -> Result<()> {
        *self = Self::try_new(value)?;
        Ok(())
    }

    /// Moves ownership out of `self`, leaving it empty.
    ///
    /// No count changes: the returned handle carries the strong reference
    /// `self` held.
    #[must_use = "dropping the taken handle releases its reference"]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Exchanges the resources of two handles without touching any count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns `true` if both handles share a control block, or both are
    /// empty.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.raw, &other.raw) {
            (Some(a), Some(b)) => a.same_block(b),
            (None, None) => true,
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> Option<RawHandle<T>> {
        self.raw
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        match self.raw {
            Some(raw) => {
                // SAFETY: we hold a strong reference.
                unsafe { raw.header() }.inc_strong();
                Self::from_raw(raw)
            }
            None => Self::empty(),
        }
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for SharedHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("value", &self.get())
            .field("use_count", &self.use_count())
            .field("weak_count", &self.weak_count())
            .finish()
    }
}

// SAFETY: the resource may be dropped on any thread holding the last strong
// handle (T: Send) and borrowed from several threads at once (T: Sync). The
// deleter is required to be Send. Counts are atomic.
unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}

// SAFETY: &SharedHandle<T> only allows cloning (atomic) and borrowing T.
unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}
