//! Exclusive ownership of a heap resource.
//!
//! [`UniqueHandle`] is the single owner of a boxed value. There are no
//! counts: the handle can be moved (or [`taken`](UniqueHandle::take)) but not
//! cloned, and the deleter runs when the owner is dropped or reset. The
//! deleter belongs to the handle rather than to one value, so it is reused
//! for every resource installed with [`UniqueHandle::reset_with`].
//!
//! A unique handle can be turned into a [`SharedHandle`] when ownership later
//! needs to be shared; the value and the deleter move into the new control
//! block.
//!
//! # Example
//!
//! ```rust
//! use tether::UniqueHandle;
//!
//! let mut one = UniqueHandle::new(String::from("Nordic"));
//! let mut two = UniqueHandle::new(String::from("Silabs"));
//!
//! // "Silabs" is released, `one` becomes empty, `two` owns "Nordic".
//! two = one.take();
//! assert!(one.is_empty());
//! assert_eq!(two.get().map(String::as_str), Some("Nordic"));
//! ```

use crate::block::{DeleterRelease, DropRelease};
use crate::error::Result;
use crate::shared::SharedHandle;
use std::fmt;
use std::mem;

type BoxedDeleter<T> = Box<dyn FnMut(T) + Send>;

/// A nullable handle that exclusively owns a heap-allocated resource.
pub struct UniqueHandle<T> {
    value: Option<Box<T>>,
    deleter: Option<BoxedDeleter<T>>,
}

impl<T> UniqueHandle<T> {
    /// Boxes `value` and owns it with the default deleter (`drop`).
    #[must_use]
    pub fn new(value: T) -> Self {
        UniqueHandle {
            value: Some(Box::new(value)),
            deleter: None,
        }
    }

    /// Boxes `value` and owns it, releasing it through `deleter`.
    #[must_use]
    pub fn with_deleter<D>(value: T, deleter: D) -> Self
    where
        D: FnMut(T) + Send + 'static,
    {
        UniqueHandle {
            value: Some(Box::new(value)),
            deleter: Some(Box::new(deleter)),
        }
    }

    /// Creates an empty handle with the default deleter.
    #[must_use]
    pub const fn empty() -> Self {
        UniqueHandle {
            value: None,
            deleter: None,
        }
    }

    /// Returns `true` if the handle owns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Borrows the resource, or `None` for an empty handle.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    /// Mutably borrows the resource, or `None` for an empty handle.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_deref_mut()
    }

    /// Releases the owned resource through the deleter and becomes empty.
    pub fn reset(&mut self) {
        if let Some(value) = self.value.take() {
            self.delete(*value);
        }
    }

    /// Installs `value`, then releases the previously owned resource.
    pub fn reset_with(&mut self, value: T) {
        if let Some(old) = self.value.replace(Box::new(value)) {
            self.delete(*old);
        }
    }

    /// Gives up ownership without running the deleter.
    ///
    /// The caller becomes responsible for the returned value.
    #[must_use = "the released value is no longer managed by the handle"]
    pub fn release(&mut self) -> Option<T> {
        self.value.take().map(|boxed| *boxed)
    }

    /// Moves ownership, and the deleter, out of `self`, leaving it empty.
    #[must_use = "dropping the taken handle releases its resource"]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }

    /// Moves the resource and deleter into a new shared control block.
    ///
    /// An empty unique handle becomes an empty shared handle. Allocation
    /// failure is fatal, see [`UniqueHandle::try_into_shared`].
    #[must_use]
    pub fn into_shared(mut self) -> SharedHandle<T> {
        let Some(value) = self.value.take() else {
            return SharedHandle::empty();
        };

        match self.deleter.take() {
            None => SharedHandle::from_release_or_abort(*value, DropRelease),
            Some(mut deleter) => SharedHandle::from_release_or_abort(
                *value,
                DeleterRelease(move |v: T| deleter(v)),
            ),
        }
    }

    /// Fallible form of [`UniqueHandle::into_shared`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`](crate::Error::OutOfMemory) if the
    /// control block cannot be allocated. The resource has already been
    /// released through the deleter in that case.
    pub fn try_into_shared(mut self) -> Result<SharedHandle<T>> {
        let Some(value) = self.value.take() else {
            return Ok(SharedHandle::empty());
        };

        match self.deleter.take() {
            None => SharedHandle::from_release(*value, DropRelease),
            Some(mut deleter) => {
                SharedHandle::from_release(*value, DeleterRelease(move |v: T| deleter(v)))
            }
        }
    }

    fn delete(&mut self, value: T) {
        match self.deleter.as_mut() {
            Some(deleter) => deleter(value),
            None => drop(value),
        }
    }
}

// SAFETY: a shared reference only reaches the value (`get`, `Debug`). The
// deleter is called through `&mut self` exclusively, so it need not be Sync.
unsafe impl<T: Sync> Sync for UniqueHandle<T> {}

impl<T> Drop for UniqueHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for UniqueHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<UniqueHandle<T>> for SharedHandle<T> {
    fn from(unique: UniqueHandle<T>) -> Self {
        unique.into_shared()
    }
}

impl<T: fmt::Debug> fmt::Debug for UniqueHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueHandle")
            .field("value", &self.get())
            .field("custom_deleter", &self.deleter.is_some())
            .finish()
    }
}
