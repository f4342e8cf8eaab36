// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Scoped allocator context.
//!
//! A per-thread "current allocator" that library users (arena allocators,
//! pool allocators) can consult wherever they heap-allocate while building
//! or polling a pipeline. [`allocate_in`] runs a factory with an allocator
//! installed and wraps the returned future so that *every* later poll
//! re-installs the same allocator, no matter which thread polls; the
//! equivalent for streams is [`allocate_in_stream`]. The context nests:
//! installing an allocator saves the previous one and restores it on scope
//! exit.
//!
//! The library itself defaults to the global allocator; the context is the
//! hook, not a policy.

use std::alloc::Layout;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

/// A user-provided allocator backing.
pub trait AllocatorImpl {
    /// Allocates `layout.size()` bytes with `layout.align()` alignment.
    /// `layout` always has a non-zero size.
    fn allocate(&self, layout: Layout) -> *mut u8;

    /// Releases an allocation made by `allocate` with the same layout.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from `allocate(layout)` on this instance and
    /// must not be used afterwards.
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout);
}

fn allocate_impl<A: AllocatorImpl>(instance: *mut (), layout: Layout) -> *mut u8 {
    // SAFETY:
    // `instance` was produced from an `&A` in `Allocator::with_instance`,
    // whose caller guarantees the referent outlives the `Allocator`.
    unsafe { (*(instance as *const A)).allocate(layout) }
}

unsafe fn deallocate_impl<A: AllocatorImpl>(instance: *mut (), ptr: *mut u8, layout: Layout) {
    // SAFETY:
    // See `allocate_impl`; `ptr`/`layout` validity is the caller's half of
    // the `deallocate` contract.
    unsafe { (*(instance as *const A)).deallocate(ptr, layout) }
}

fn global_allocate(_instance: *mut (), layout: Layout) -> *mut u8 {
    // SAFETY:
    // `layout` has a non-zero size per the `AllocatorImpl` contract.
    unsafe { std::alloc::alloc(layout) }
}

unsafe fn global_deallocate(_instance: *mut (), ptr: *mut u8, layout: Layout) {
    // SAFETY:
    // Caller passes a pointer obtained from `global_allocate` with the same
    // layout.
    unsafe { std::alloc::dealloc(ptr, layout) }
}

/// A type-erased allocator value: an instance pointer plus allocate and
/// deallocate entry points. `Copy` so it can be captured per pipeline stage
/// and stashed in thread-local context.
#[derive(Clone, Copy)]
pub struct Allocator {
    instance: *mut (),
    allocate: fn(*mut (), Layout) -> *mut u8,
    deallocate: unsafe fn(*mut (), *mut u8, Layout),
}

thread_local! {
    static CURRENT_ALLOCATOR: Cell<Allocator> = Cell::new(Allocator::global());
}

impl Allocator {
    /// The process-global allocator.
    pub fn global() -> Allocator {
        Allocator {
            instance: std::ptr::null_mut(),
            allocate: global_allocate,
            deallocate: global_deallocate,
        }
    }

    /// Wraps a borrowed allocator implementation.
    ///
    /// # Safety
    ///
    /// The returned value erases the borrow: the caller must guarantee that
    /// `instance` outlives every use of the returned `Allocator`, including
    /// copies of it captured by [`allocate_in`] wrappers and installs via
    /// [`AllocGuard`].
    pub unsafe fn with_instance<A: AllocatorImpl>(instance: &A) -> Allocator {
        Allocator {
            instance: instance as *const A as *mut (),
            allocate: allocate_impl::<A>,
            deallocate: deallocate_impl::<A>,
        }
    }

    /// The allocator currently installed on this thread.
    pub fn current() -> Allocator {
        CURRENT_ALLOCATOR.with(|current| current.get())
    }

    /// Allocates through this allocator. `layout` must have a non-zero
    /// size.
    pub fn allocate(&self, layout: Layout) -> *mut u8 {
        debug_assert!(layout.size() > 0);
        (self.allocate)(self.instance, layout)
    }

    /// Releases an allocation made by this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from `allocate(layout)` on this allocator and
    /// must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY:
        // Forwarded contract.
        unsafe { (self.deallocate)(self.instance, ptr, layout) }
    }
}

/// RAII scope installing an allocator as the thread's current one; the
/// previous allocator is restored on drop.
pub struct AllocGuard {
    previous: Allocator,
}

impl AllocGuard {
    pub fn new(allocator: Allocator) -> AllocGuard {
        let previous = CURRENT_ALLOCATOR.with(|current| current.replace(allocator));
        AllocGuard { previous }
    }
}

impl Drop for AllocGuard {
    fn drop(&mut self) {
        CURRENT_ALLOCATOR.with(|current| current.set(self.previous));
    }
}

/// Future wrapper that re-installs a captured allocator around every poll.
pub struct ScopedFuture<F> {
    allocator: Allocator,
    future: F,
}

impl<F: Unpin> Unpin for ScopedFuture<F> {}

impl<F: Future + Unpin> Future for ScopedFuture<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<F::Output> {
        let this = &mut *self;
        let _guard = AllocGuard::new(this.allocator);
        Pin::new(&mut this.future).poll(cx)
    }
}

/// Stream wrapper that re-installs a captured allocator around every poll.
pub struct ScopedStream<S> {
    allocator: Allocator,
    stream: S,
}

impl<S: Unpin> Unpin for ScopedStream<S> {}

impl<S: Stream + Unpin> Stream for ScopedStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        let this = &mut *self;
        let _guard = AllocGuard::new(this.allocator);
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

/// Runs `f` with `allocator` installed and wraps the future it returns so
/// the same allocator is re-installed around every subsequent poll.
pub fn allocate_in<F, Fut>(allocator: Allocator, f: F) -> ScopedFuture<Fut>
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let _guard = AllocGuard::new(allocator);
    ScopedFuture {
        allocator,
        future: f(),
    }
}

/// Like [`allocate_in`] but for a factory returning a stream.
pub fn allocate_in_stream<F, S>(allocator: Allocator, f: F) -> ScopedStream<S>
where
    F: FnOnce() -> S,
    S: Stream,
{
    let _guard = AllocGuard::new(allocator);
    ScopedStream {
        allocator,
        stream: f(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::block_on::block_on;
    use crate::future::yield_now;

    // Delegates to the global allocator, counting calls.
    struct CountingAllocator {
        allocations: AtomicUsize,
    }

    impl AllocatorImpl for CountingAllocator {
        fn allocate(&self, layout: Layout) -> *mut u8 {
            self.allocations.fetch_add(1, Ordering::SeqCst);
            // SAFETY:
            // Non-zero size per the trait contract.
            unsafe { std::alloc::alloc(layout) }
        }

        unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
            // SAFETY:
            // Forwarded contract.
            unsafe { std::alloc::dealloc(ptr, layout) }
        }
    }

    fn allocate_one_byte() {
        let alloc = Allocator::current();
        let layout = Layout::from_size_align(1, 1).unwrap();
        let ptr = alloc.allocate(layout);
        assert!(!ptr.is_null());
        // SAFETY:
        // Just allocated with this allocator and layout.
        unsafe { alloc.deallocate(ptr, layout) };
    }

    #[test]
    fn scope_nests_and_restores() {
        let counting = CountingAllocator {
            allocations: AtomicUsize::new(0),
        };

        {
            // SAFETY:
            // `counting` outlives the guard below.
            let guard = AllocGuard::new(unsafe { Allocator::with_instance(&counting) });
            allocate_one_byte();
            drop(guard);
        }
        allocate_one_byte();

        // Only the allocation inside the scope went through `counting`.
        assert_eq!(counting.allocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn polls_reinstall_the_captured_allocator() {
        let counting = CountingAllocator {
            allocations: AtomicUsize::new(0),
        };

        // SAFETY:
        // `counting` outlives the wrapped future below.
        let allocator = unsafe { Allocator::with_instance(&counting) };

        let fut = allocate_in(allocator, || {
            Box::pin(async {
                // Every resumption runs with the captured allocator
                // installed, even though the driver knows nothing about it.
                allocate_one_byte();
                yield_now().await;
                allocate_one_byte();
            })
        });

        block_on(fut);
        assert_eq!(counting.allocations.load(Ordering::SeqCst), 2);
    }
}
