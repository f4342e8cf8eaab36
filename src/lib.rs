// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Future and stream combinators for poll-driven asynchronous computation.
//!
//! This crate is built directly on the standard poll protocol — a work unit
//! is a `Future` (or a `futures::Stream`), its single operation is "advance
//! as far as possible without blocking and register a waker" — and provides
//! everything needed to compose and drive such values without owning any
//! threads, event loop, or IO:
//!
//! * terminal values and adapters for futures ([`ready`], [`pending`],
//!   [`yield_now`], [`FutureExt::map`]) and streams (the
//!   [`stream`] module: sources, `map`/`take`/`skip`/`zip`/`window`/… and
//!   the fold-style consumers);
//! * concurrency combinators that interleave children by poll re-entry:
//!   the [`wait_all2`]..[`wait_all5`]/[`wait_all_slice`] family resolves
//!   when every child has, the [`wait_first2`]..[`wait_first5`]/
//!   [`wait_first_slice`] family when the first one has;
//! * a blocking driver, [`block_on`], backed by a condition-variable waker,
//!   and the [`NeverBlocks`] marker with the synchronous drivers
//!   [`run_sync`] and [`stream::sync_iter`] for pipelines that provably
//!   never return `Poll::Pending`;
//! * cooperative synchronization primitives that are safe across suspension
//!   points: a strict-FIFO [`sync::Mutex`], a writer-preferring
//!   [`sync::SharedMutex`], and the one-shot [`single_event`] channel;
//! * timed sleeps over a caller-supplied [`Timer`] backend, and the bridges
//!   [`make_pollable`] / [`make_resumable`] between the poll world and
//!   callback-driven execution;
//! * [`generic`] type erasure and the scoped-allocator context in
//!   [`alloc`].
//!
//! Nothing here schedules across cores: a pollable advances only when
//! someone polls it, and "concurrency" under a `wait_all` is interleaving on
//! the polling thread. Parallelism, when wanted, comes from wakers fired by
//! other threads, as the [`single_event`] and [`Timer`] tests demonstrate.
//!
//! # Example
//!
//!    ```
//!    use pollcoro::stream::{range, StreamExt};
//!    use pollcoro::{block_on, wait_all2};
//!
//!    let sum_of_squares = range(1u32, 11).map(|n| n * n).fold(0, |acc, n| {
//!        *acc += n;
//!        true
//!    });
//!    let count = range(1u32, 11).fold(0, |acc, _| {
//!        *acc += 1;
//!        true
//!    });
//!
//!    assert_eq!(block_on(wait_all2(sum_of_squares, count)), (385, 10));
//!    ```

pub mod alloc;
mod block_on;
mod blocking;
mod event;
pub mod future;
mod generic;
pub mod interop;
pub mod stream;
pub mod sync;
mod timer;
mod wait_all;
mod wait_first;
mod waker;

pub use block_on::block_on;
pub use block_on::run_sync;
pub use blocking::NeverBlocks;
pub use event::single_event;
pub use event::EventSetter;
pub use event::SetError;
pub use event::SingleEvent;
pub use future::pending;
pub use future::ready;
pub use future::yield_now;
pub use future::FutureExt;
pub use future::Yield;
pub use generic::generic;
pub use generic::generic_stream;
pub use generic::GenericFuture;
pub use generic::GenericStream;
pub use interop::make_pollable;
pub use interop::make_resumable;
pub use interop::Completion;
pub use interop::Resumable;
pub use interop::Scheduler;
pub use timer::sleep_for;
pub use timer::sleep_until;
pub use timer::Sleep;
pub use timer::Timer;
pub use wait_all::wait_all2;
pub use wait_all::wait_all3;
pub use wait_all::wait_all4;
pub use wait_all::wait_all5;
pub use wait_all::wait_all_slice;
pub use wait_first::wait_first2;
pub use wait_first::wait_first3;
pub use wait_first::wait_first4;
pub use wait_first::wait_first5;
pub use wait_first::wait_first_slice;
