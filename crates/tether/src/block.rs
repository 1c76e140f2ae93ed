//! Control blocks: the shared bookkeeping behind every handle.
//!
//! A control block is a single heap allocation holding the reference counts,
//! the deleter and the resource itself:
//!
//! ```text
//! +-------------------------------+
//! | Header                        |
//! |   strong: AtomicUsize         |
//! |   weak:   AtomicUsize         |
//! |   drop_value: unsafe fn       |
//! |   deallocate: unsafe fn       |
//! +-------------------------------+
//! | deleter: R  (ManuallyDrop)    |
//! | value:   T  (ManuallyDrop)    |
//! +-------------------------------+
//! ```
//!
//! The header is `#[repr(C)]` and sits at offset zero so a `NonNull<Header>`
//! can be cast back to the concrete `Block<T, R>` by the two monomorphized
//! functions it stores. Handles therefore only carry `T` in their type; the
//! deleter type is erased.
//!
//! # Counting
//!
//! - `strong` counts live strong handles.
//! - `weak` counts live weak handles **plus one** reference held jointly by
//!   all strong handles. That extra reference is dropped as soon as the
//!   resource and deleter are moved out of the block, before the deleter
//!   runs. The block is freed by whichever side brings `weak` to zero, and
//!   only once, even if the deleter panics.
//!
//! # Memory ordering
//!
//! Increments are `Relaxed`: a new handle can only be made from an existing
//! one, which already keeps the block alive. Decrements are `Release`, and the
//! thread that observes the final decrement issues an `Acquire` fence before
//! touching the resource or the allocation. Upgrading a weak handle is one
//! compare-and-swap loop that refuses to move `strong` away from zero.

use crate::error::{Error, Result};
use crate::stats;
use std::alloc::{self, Layout};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize, Ordering};

/// Counts above this value are treated as overflow.
pub(crate) const MAX_REFCOUNT: usize = isize::MAX as usize;

/// How a block gives up its resource once the last strong handle is gone.
pub(crate) trait Release<T> {
    fn release(self, value: T);
}

/// Plain `drop` of the resource.
pub(crate) struct DropRelease;

impl<T> Release<T> for DropRelease {
    #[inline]
    fn release(self, value: T) {
        drop(value);
    }
}

/// A caller-supplied deleter.
pub(crate) struct DeleterRelease<D>(pub(crate) D);

impl<T, D: FnOnce(T)> Release<T> for DeleterRelease<D> {
    #[inline]
    fn release(self, value: T) {
        (self.0)(value);
    }
}

/// Type-erased part of a control block.
#[repr(C)]
pub(crate) struct Header {
    strong: AtomicUsize,
    weak: AtomicUsize,
    /// Releases the resource and the implicit weak reference.
    drop_value: unsafe fn(NonNull<Header>),
    deallocate: unsafe fn(NonNull<Header>),
}

impl Header {
    /// Number of live strong handles.
    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Acquire)
    }

    /// Number of live weak handles, excluding the reference held by the
    /// strong side.
    ///
    /// Like `strong_count`, this is a snapshot for diagnostics.
    pub(crate) fn weak_count(&self) -> usize {
        let weak = self.weak.load(Ordering::Acquire);
        if self.strong.load(Ordering::Acquire) > 0 {
            weak.saturating_sub(1)
        } else {
            weak
        }
    }

    /// Adds a strong reference. The caller already holds one.
    ///
    /// # Panics
    ///
    /// Panics if the count would pass `MAX_REFCOUNT`.
    #[inline]
    pub(crate) fn inc_strong(&self) {
        let old = self.strong.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            panic!("Reference count overflow in SharedHandle::clone");
        }
    }

    /// Adds a strong reference only if at least one still exists.
    ///
    /// Returns `false`, leaving the count untouched, once the resource has
    /// been (or is being) released.
    pub(crate) fn inc_strong_if_nonzero(&self) -> bool {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                panic!("Reference count overflow in WeakHandle::lock");
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Adds a weak reference. The caller holds a strong or weak one.
    ///
    /// # Panics
    ///
    /// Panics if the count would pass `MAX_REFCOUNT`.
    #[inline]
    pub(crate) fn inc_weak(&self) {
        let old = self.weak.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            panic!("Reference count overflow in WeakHandle::clone");
        }
    }

    #[cfg(test)]
    pub(crate) fn force_strong(&self, count: usize) {
        self.strong.store(count, Ordering::Release);
    }
}

/// Drops one strong reference, releasing the resource on the last one.
///
/// # Safety
///
/// `header` must point to a live block and the caller must own one strong
/// reference, which is consumed.
pub(crate) unsafe fn release_strong(header: NonNull<Header>) {
    // SAFETY: the caller's strong reference keeps the block alive.
    let block = unsafe { header.as_ref() };
    if block.strong.fetch_sub(1, Ordering::Release) != 1 {
        return;
    }
    atomic::fence(Ordering::Acquire);

    crate::lifecycle!("strong count reached zero, releasing resource");
    let drop_value = block.drop_value;
    // SAFETY: strong went 1 -> 0 on this thread; nobody else can reach the
    // value, and inc_strong_if_nonzero will never bring it back. The implicit
    // weak reference is handed over and the block is not touched afterwards.
    unsafe { drop_value(header) };
    stats::record_deleter_run();
}

/// Drops one weak reference, freeing the block on the last one.
///
/// # Safety
///
/// `header` must point to a live block and the caller must own one weak
/// reference (or the implicit one of the strong side), which is consumed.
pub(crate) unsafe fn release_weak(header: NonNull<Header>) {
    // SAFETY: the caller's weak reference keeps the block alive.
    let block = unsafe { header.as_ref() };
    if block.weak.fetch_sub(1, Ordering::Release) != 1 {
        return;
    }
    atomic::fence(Ordering::Acquire);

    let deallocate = block.deallocate;
    // SAFETY: weak reached zero, which implies strong is zero and the value
    // was already released. No other reference to the block remains.
    unsafe { deallocate(header) };
}

/// Concrete layout of a control block.
#[repr(C)]
pub(crate) struct Block<T, R> {
    header: Header,
    release: ManuallyDrop<R>,
    value: ManuallyDrop<T>,
}

impl<T, R: Release<T>> Block<T, R> {
    /// Layout requested from the global allocator.
    pub(crate) fn layout() -> Layout {
        Layout::new::<Self>()
    }

    /// Allocates a block owning `value` with `strong = 1`.
    ///
    /// Returns the block header and a pointer to the value inside it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] when the allocator fails. The resource
    /// is handed to `release` before returning, so it is released exactly
    /// once and nothing is left half-built.
    pub(crate) fn allocate(value: T, release: R) -> Result<(NonNull<Header>, NonNull<T>)> {
        let layout = Self::layout();

        // SAFETY: layout has non-zero size, the header alone is non-empty.
        let raw = unsafe { alloc::alloc(layout) }.cast::<Self>();
        let Some(block) = NonNull::new(raw) else {
            return Err(Self::release_unallocated(value, release));
        };

        // SAFETY: block is freshly allocated with Self's layout.
        unsafe {
            block.as_ptr().write(Block {
                header: Header {
                    strong: AtomicUsize::new(1),
                    weak: AtomicUsize::new(1),
                    drop_value: Self::drop_value,
                    deallocate: Self::deallocate,
                },
                release: ManuallyDrop::new(release),
                value: ManuallyDrop::new(value),
            });
        }
        stats::record_allocated();
        crate::lifecycle!(
            "allocated control block for {} ({} bytes)",
            std::any::type_name::<T>(),
            layout.size()
        );

        // SAFETY: in-bounds field projection of a valid allocation.
        // ManuallyDrop<T> is repr(transparent) over T.
        let value = unsafe {
            let field = &raw mut (*block.as_ptr()).value;
            NonNull::new_unchecked(field.cast::<T>())
        };
        Ok((block.cast::<Header>(), value))
    }

    /// Releases a resource whose control block could not be allocated.
    fn release_unallocated(value: T, release: R) -> Error {
        let size = Self::layout().size();
        crate::lifecycle!(
            "control block allocation failed for {} ({} bytes)",
            std::any::type_name::<T>(),
            size
        );
        release.release(value);
        stats::record_deleter_run();
        Error::OutOfMemory { size }
    }

    /// Moves the resource and deleter out of the block, gives up the
    /// implicit weak reference and runs the deleter.
    ///
    /// # Safety
    ///
    /// `header` must belong to a `Block<T, R>` whose value has not been
    /// released yet, no one else may access the value, and the caller must
    /// own the implicit weak reference, which is consumed.
    unsafe fn drop_value(header: NonNull<Header>) {
        let block = header.cast::<Self>().as_ptr();
        // SAFETY: both fields are initialized and read exactly once.
        let (release, value) = unsafe {
            (
                ManuallyDrop::into_inner((&raw const (*block).release).read()),
                ManuallyDrop::into_inner((&raw const (*block).value).read()),
            )
        };
        // SAFETY: nothing in the block is read past this point. A panicking
        // deleter can no longer keep the block alive.
        unsafe { release_weak(header) };
        release.release(value);
    }

    /// Returns the block's memory to the allocator.
    ///
    /// # Safety
    ///
    /// `header` must belong to a `Block<T, R>` with no remaining references.
    unsafe fn deallocate(header: NonNull<Header>) {
        // SAFETY: allocated in `allocate` with the same layout.
        unsafe { alloc::dealloc(header.as_ptr().cast::<u8>(), Self::layout()) };
        stats::record_freed();
        crate::lifecycle!("freed control block for {}", std::any::type_name::<T>());
    }
}

/// The pair of pointers every non-empty handle carries.
pub(crate) struct RawHandle<T> {
    pub(crate) block: NonNull<Header>,
    pub(crate) value: NonNull<T>,
}

impl<T> Clone for RawHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawHandle<T> {}

impl<T> RawHandle<T> {
    /// Allocates a new block, see [`Block::allocate`].
    pub(crate) fn allocate<R: Release<T>>(value: T, release: R) -> Result<Self> {
        let (block, value) = Block::allocate(value, release)?;
        Ok(RawHandle { block, value })
    }

    /// Borrows the header.
    ///
    /// # Safety
    ///
    /// The caller must hold a strong or weak reference to the block.
    #[inline]
    pub(crate) unsafe fn header(&self) -> &Header {
        // SAFETY: guaranteed by the caller.
        unsafe { self.block.as_ref() }
    }

    /// Whether two handles share a control block.
    #[inline]
    pub(crate) fn same_block(&self, other: &Self) -> bool {
        self.block == other.block
    }
}
