/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Handles through which the ledger is read and written.
//!
//! - [`internal::EventLedger`] reads and writes. It is owned by the collaborators that insert events
//!   and blocks and write consensus annotations.
//! - [`public::LedgerCamera`] and [`public::LedgerSnapshot`] only read.

pub mod internal;

pub mod public;
