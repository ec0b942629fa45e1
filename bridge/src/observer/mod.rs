// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event observers: the per-event exchange logic each monitor feeds. One
//! observer turns confirmed NCG deposits into wrapped-token mints, the
//! other turns confirmed burns into native transfers. Both record history
//! before dispatching anything, which is what makes replays after a crash
//! harmless.

mod burn;
mod deposit;

pub use burn::WncgBurnObserver;
pub use deposit::NcgDepositObserver;
