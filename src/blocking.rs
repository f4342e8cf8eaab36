// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Compile-time proofs that a future or stream can never block.
//!
//! A pipeline built exclusively from non-blocking pieces never returns
//! `Poll::Pending`, so a driver can skip waker plumbing entirely and run it
//! as a plain loop (see [`run_sync`](crate::run_sync) and
//! [`sync_iter`](crate::stream::sync_iter)). The proof is carried by a marker
//! trait: terminal values implement it unconditionally, combinators implement
//! it when all of their children do. Composition is therefore exactly the
//! "blocking if any child is blocking" rule, expressed as trait bounds.
//!
//! The trait is a static optimization hint and contract, not a semantic
//! switch; implementing it for a type whose poll can return `Pending` makes
//! the synchronous drivers spin.

/// Marker for futures and streams whose poll never returns `Poll::Pending`.
pub trait NeverBlocks {}

impl<T: NeverBlocks + ?Sized> NeverBlocks for &mut T {}
impl<T: NeverBlocks + ?Sized> NeverBlocks for Box<T> {}
