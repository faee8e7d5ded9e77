/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of an [`EventLedger`](crate::ledger::accessors::internal::EventLedger).
//!
//! ## Write retries
//!
//! Every write the ledger makes is guarded by preconditions (see
//! [`WriteBatch::require`](crate::ledger::pluggables::WriteBatch::require)). When a concurrent
//! writer invalidates a precondition between the ledger's read and its write, the ledger re-reads and
//! tries again, at most [`Configuration::max_write_retries`] times, before giving up with
//! [`WriteContention`](crate::ledger::accessors::internal::LedgerError::WriteContention).
//!
//! ## Log Events
//!
//! The ledger logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a [logging
//! implementation](https://docs.rs/log/latest/log/#available-logging-implementations).

use typed_builder::TypedBuilder;

use crate::queries::ancestry::TraversalBudget;

#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.log_events(...)`

    Optional:
    - `.max_write_retries(...)` (default: 8)
    - `.traversal_budget(...)` (default: unbounded)
"))]
pub struct Configuration {
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
    #[builder(
        default = 8,
        setter(doc = "Set how many times a conflicting write is retried before the ledger reports write contention. Optional.")
    )]
    pub max_write_retries: u32,
    #[builder(
        default,
        setter(doc = "Set the budget applied to ancestry traversals that do not carry their own. Optional.")
    )]
    pub traversal_budget: TraversalBudget,
}
