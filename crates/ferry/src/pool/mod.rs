// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Transports that manage several instances produced by a [`Factory`](crate::Factory).
//!
//! - [`Recycler`] discards its instance and asks the factory for a new one after a time to
//!   live, after a number of uses, or when an external signal arrives.
//! - [`Rotator`] keeps a fixed set of instances and spreads requests over them round-robin,
//!   for example to open more than one HTTP/2 connection per host.
//!
//! Both resolve the instance under a short lock and send the request outside of it.

mod recycler;
mod rotator;

pub use recycler::{Recycler, RecyclerOptions};
pub use rotator::Rotator;
