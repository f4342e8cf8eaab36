// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Waker construction helpers.
//!
//! The standard `Waker` is the library's one inversion-of-control primitive:
//! combinators publish it to children, children fire it from anywhere. The
//! helper here builds a `Waker` from a `Weak` reference so that a published
//! waker does not keep its target alive: once the owning driver is dropped,
//! late wakes from timers, threads, or schedulers degrade to no-ops instead
//! of touching freed state.

use std::mem::ManuallyDrop;
use std::sync::Weak;
use std::task::RawWaker;
use std::task::RawWakerVTable;
use std::task::Waker;

/// Like `futures::task::ArcWake` but holding the target through a `Weak<T>`.
pub(crate) trait WeakWake: Send + Sync {
    fn wake_by_ref(weak_self: &Weak<Self>);

    fn wake(weak_self: Weak<Self>) {
        Self::wake_by_ref(&weak_self)
    }
}

fn waker_vtable<W: WeakWake>() -> &'static RawWakerVTable {
    &RawWakerVTable::new(
        clone_weak_raw::<W>,
        wake_weak_raw::<W>,
        wake_by_ref_weak_raw::<W>,
        drop_weak_raw::<W>,
    )
}

unsafe fn clone_weak_raw<W: WeakWake>(data: *const ()) -> RawWaker {
    // SAFETY:
    // The data pointer came from `Weak::into_raw` in `new_waker` (or a clone
    // made here), so it is a live weak count. ManuallyDrop keeps this
    // function from consuming it.
    let weak = ManuallyDrop::new(unsafe { Weak::<W>::from_raw(data as *const W) });

    // Forget the clone as well: its weak count now belongs to the returned
    // RawWaker.
    let _weak_clone: ManuallyDrop<_> = weak.clone();

    RawWaker::new(data, waker_vtable::<W>())
}

unsafe fn wake_weak_raw<W: WeakWake>(data: *const ()) {
    // SAFETY:
    // Consuming wake: take ownership of the weak count held by the waker.
    let weak = unsafe { Weak::<W>::from_raw(data as *const W) };

    WeakWake::wake(weak)
}

unsafe fn wake_by_ref_weak_raw<W: WeakWake>(data: *const ()) {
    // SAFETY:
    // Same provenance as `clone_weak_raw`; the waker retains its weak count
    // so the Weak must not be dropped here.
    let weak = ManuallyDrop::new(unsafe { Weak::<W>::from_raw(data as *const W) });

    WeakWake::wake_by_ref(&weak)
}

unsafe fn drop_weak_raw<W: WeakWake>(data: *const ()) {
    // SAFETY:
    // Releases the weak count owned by the dropped waker.
    drop(unsafe { Weak::from_raw(data as *const W) })
}

pub(crate) fn new_waker<W: WeakWake>(w: Weak<W>) -> Waker {
    // SAFETY:
    // The vtable functions above uphold the RawWaker contract: clone
    // increments the weak count, wake/drop consume it, wake_by_ref leaves it
    // untouched, and all of them are thread-safe because `W: Send + Sync`.
    unsafe {
        Waker::from_raw(RawWaker::new(
            w.into_raw() as *const (),
            waker_vtable::<W>(),
        ))
    }
}
