//! Types that are used across multiple components of the ledger store.
//!
//! Types specific to single components, e.g., the parameter and result types of individual queries,
//! live in the modules of those components, e.g., [`crate::queries::ancestry`].

pub mod data_types;

pub mod event;

pub mod block;
