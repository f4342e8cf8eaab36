// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::UnsafeCell;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

use intrusive_collections::intrusive_adapter;
use intrusive_collections::linked_list::LinkedList;
use intrusive_collections::linked_list::LinkedListOps;
use intrusive_collections::DefaultLinkOps;
use intrusive_collections::LinkOps;

use crate::sync::SpinLock;

// An atomic version of a LinkedListLink. Allows the waiter queue owner to
// observe `is_linked` from cancellation paths without holding the queue's
// spin lock.
pub struct AtomicLink {
    prev: UnsafeCell<Option<NonNull<AtomicLink>>>,
    next: UnsafeCell<Option<NonNull<AtomicLink>>>,
    linked: AtomicBool,
}

impl AtomicLink {
    fn new() -> AtomicLink {
        AtomicLink {
            linked: AtomicBool::new(false),
            prev: UnsafeCell::new(None),
            next: UnsafeCell::new(None),
        }
    }

    fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Relaxed)
    }
}

impl DefaultLinkOps for AtomicLink {
    type Ops = AtomicLinkOps;

    const NEW: Self::Ops = AtomicLinkOps;
}

// SAFETY:
// The only way to mutate `AtomicLink` is via the `LinkedListOps` trait whose
// methods are all unsafe and require that the caller has first called
// `acquire_link` (and had it return true) to use them safely.
unsafe impl Send for AtomicLink {}
// SAFETY:
// See above.
unsafe impl Sync for AtomicLink {}

#[derive(Copy, Clone, Default)]
pub struct AtomicLinkOps;

// SAFETY:
// `acquire_link` uses an atomic swap so only one owner can hold the link at
// a time.
unsafe impl LinkOps for AtomicLinkOps {
    type LinkPtr = NonNull<AtomicLink>;

    unsafe fn acquire_link(&mut self, ptr: Self::LinkPtr) -> bool {
        !ptr.as_ref().linked.swap(true, Ordering::Acquire)
    }

    unsafe fn release_link(&mut self, ptr: Self::LinkPtr) {
        ptr.as_ref().linked.store(false, Ordering::Release)
    }
}

// SAFETY:
// The pointer accessors only run while the link is acquired, which the list
// owner serializes with its own lock.
unsafe impl LinkedListOps for AtomicLinkOps {
    unsafe fn next(&self, ptr: Self::LinkPtr) -> Option<Self::LinkPtr> {
        *ptr.as_ref().next.get()
    }

    unsafe fn prev(&self, ptr: Self::LinkPtr) -> Option<Self::LinkPtr> {
        *ptr.as_ref().prev.get()
    }

    unsafe fn set_next(&mut self, ptr: Self::LinkPtr, next: Option<Self::LinkPtr>) {
        *ptr.as_ref().next.get() = next;
    }

    unsafe fn set_prev(&mut self, ptr: Self::LinkPtr, prev: Option<Self::LinkPtr>) {
        *ptr.as_ref().prev.get() = prev;
    }
}

/// Whether a waiter wants shared or exclusive access.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Shared,
    Exclusive,
}

enum State {
    Init,
    Waiting(Waker),
    Woken,
    Finished,
    Processing,
}

// Indicates the queue to which the waiter currently belongs. The lock
// implementations update this value when adding/removing a Waiter from their
// waiter lists; `None` means dequeued (and, for lock waiters, that ownership
// has been handed over).
#[repr(u8)]
#[derive(Debug, Eq, PartialEq)]
pub enum WaitingFor {
    // The waiter is not linked into any waiter list.
    None = 0,
    // The waiter is linked into a Mutex's waiter list.
    Mutex = 1,
    // The waiter is linked into a SharedMutex's waiter list.
    SharedMutex = 2,
}

// The cancellation function called when a `WaitFuture` is dropped before
// completing, along with the pointer-sized context it needs to find the
// owning lock.
struct Cancel {
    c: fn(usize, &Waiter, bool),
    data: usize,
}

/// A node representing one pending acquisition, queued in a lock's FIFO
/// waiter list and woken when the lock is handed to it.
pub struct Waiter {
    link: AtomicLink,
    state: SpinLock<State>,
    cancel: SpinLock<Cancel>,
    kind: Kind,
    waiting_for: AtomicU8,
}

impl Waiter {
    // Creates a new, initialized Waiter.
    //
    // `kind` indicates whether this waiter is for a shared or an exclusive
    // acquisition.
    //
    // `cancel` is called when the `WaitFuture` returned by `wait()` is
    // dropped before it can complete, with `cancel_data` as its first
    // parameter. The last parameter tells the cancel function whether the
    // waiter had already been woken (and so may already own the lock).
    //
    // `waiting_for` indicates the waiter list this `Waiter` will be added
    // to.
    pub fn new(
        kind: Kind,
        cancel: fn(usize, &Waiter, bool),
        cancel_data: usize,
        waiting_for: WaitingFor,
    ) -> Waiter {
        Waiter {
            link: AtomicLink::new(),
            state: SpinLock::new(State::Init),
            cancel: SpinLock::new(Cancel {
                c: cancel,
                data: cancel_data,
            }),
            kind,
            waiting_for: AtomicU8::new(waiting_for as u8),
        }
    }

    // The kind of lock that this `Waiter` is waiting to acquire.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    // Returns true if this `Waiter` is currently linked into a waiter list.
    pub fn is_linked(&self) -> bool {
        self.link.is_linked()
    }

    // Indicates the waiter list to which this `Waiter` belongs.
    pub fn is_waiting_for(&self) -> WaitingFor {
        match self.waiting_for.load(Ordering::Acquire) {
            0 => WaitingFor::None,
            1 => WaitingFor::Mutex,
            2 => WaitingFor::SharedMutex,
            v => panic!("Unknown value for `WaitingFor`: {}", v),
        }
    }

    // Changes the waiter list to which this `Waiter` belongs.
    pub fn set_waiting_for(&self, waiting_for: WaitingFor) {
        self.waiting_for.store(waiting_for as u8, Ordering::Release);
    }

    // Waits until woken by the owning lock.
    pub fn wait(&self) -> WaitFuture<'_> {
        WaitFuture { waiter: self }
    }

    // Wakes the task associated with this `Waiter`. Must only be called
    // after the waiter has been removed from its list.
    pub fn wake(&self) {
        debug_assert!(!self.is_linked(), "Cannot wake `Waiter` while linked");
        debug_assert_eq!(self.is_waiting_for(), WaitingFor::None);

        let mut state = self.state.lock();

        if let State::Waiting(waker) = mem::replace(&mut *state, State::Woken) {
            mem::drop(state);
            waker.wake();
        }
    }
}

/// Future that resolves once the owning lock wakes the waiter.
pub struct WaitFuture<'w> {
    waiter: &'w Waiter,
}

impl<'w> Future for WaitFuture<'w> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let mut state = self.waiter.state.lock();

        match mem::replace(&mut *state, State::Processing) {
            State::Init => {
                *state = State::Waiting(cx.waker().clone());

                Poll::Pending
            }
            State::Waiting(old_waker) => {
                // Register the most recently passed waker.
                *state = State::Waiting(cx.waker().clone());
                mem::drop(state);
                mem::drop(old_waker);

                Poll::Pending
            }
            State::Woken => {
                *state = State::Finished;
                Poll::Ready(())
            }
            State::Finished => {
                panic!("future polled after returning Poll::Ready");
            }
            State::Processing => {
                panic!("unexpected waiter state");
            }
        }
    }
}

impl<'w> Drop for WaitFuture<'w> {
    fn drop(&mut self) {
        let state = self.waiter.state.lock();

        match *state {
            State::Finished => {}
            State::Processing => panic!("unexpected waiter state"),
            State::Woken => {
                mem::drop(state);

                // We were woken but not polled to completion, so ownership
                // may already have been handed to us. Let the lock pass it
                // to the next waiter.
                let cancel = self.waiter.cancel.lock();
                let c = cancel.c;
                let data = cancel.data;
                mem::drop(cancel);

                c(data, self.waiter, true);
            }
            _ => {
                mem::drop(state);

                // Not woken; unlink from the queue.
                let cancel = self.waiter.cancel.lock();
                let c = cancel.c;
                let data = cancel.data;
                mem::drop(cancel);

                c(data, self.waiter, false);
            }
        }
    }
}

intrusive_adapter!(pub WaiterAdapter = Arc<Waiter>: Waiter { link: AtomicLink });

pub type WaiterList = LinkedList<WaiterAdapter>;
