/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the ledger's
//! [config](crate::config::Configuration).
//!
//! The ledger logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [SetConsensus](crate::events::SetConsensusEvent) is printed:
//!
//! ```text
//! SetConsensus, 1701329264, fNGCJyk, 12, 3
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the event's hash.
//! - The fourth value is the height of the block the event was ordered into.
//! - The fifth value is the event's order within that block.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const INSERT_EVENT: &str = "InsertEvent";
pub const INSERT_BLOCK: &str = "InsertBlock";
pub const SET_CONSENSUS: &str = "SetConsensus";
pub const MARK_REPLAYER: &str = "MarkReplayer";
pub const SET_REQUIRED_BLOCK_HEIGHT: &str = "SetRequiredBlockHeight";
pub const SET_EFFECTIVE_CONFIGURATION: &str = "SetEffectiveConfiguration";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl LedgerEvent {
    pub(crate) fn log(&self) {
        match self {
            LedgerEvent::InsertEvent(event) => InsertEventEvent::get_logger()(event),
            LedgerEvent::InsertBlock(event) => InsertBlockEvent::get_logger()(event),
            LedgerEvent::SetConsensus(event) => SetConsensusEvent::get_logger()(event),
            LedgerEvent::MarkReplayer(event) => MarkReplayerEvent::get_logger()(event),
            LedgerEvent::SetRequiredBlockHeight(event) => {
                SetRequiredBlockHeightEvent::get_logger()(event)
            }
            LedgerEvent::SetEffectiveConfiguration(event) => {
                SetEffectiveConfigurationEvent::get_logger()(event)
            }
        }
    }
}

impl Logger for InsertEventEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_event_event: &InsertEventEvent| {
            log::info!(
                "{}, {}, {}, {:?}, {}",
                INSERT_EVENT,
                secs_since_unix_epoch(insert_event_event.timestamp),
                first_seven_base64_chars(&insert_event_event.event.bytes()),
                insert_event_event.event_type,
                insert_event_event.local_event_number
            )
        };
        Box::new(logger)
    }
}

impl Logger for InsertBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_block_event: &InsertBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                INSERT_BLOCK,
                secs_since_unix_epoch(insert_block_event.timestamp),
                insert_block_event.block.block_height,
                insert_block_event.block.witness.len(),
                insert_block_event.block.consensus_proof_hash.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for SetConsensusEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |set_consensus_event: &SetConsensusEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SET_CONSENSUS,
                secs_since_unix_epoch(set_consensus_event.timestamp),
                first_seven_base64_chars(&set_consensus_event.event.bytes()),
                set_consensus_event.block_height,
                set_consensus_event.block_order
            )
        };
        Box::new(logger)
    }
}

impl Logger for MarkReplayerEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |mark_replayer_event: &MarkReplayerEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                MARK_REPLAYER,
                secs_since_unix_epoch(mark_replayer_event.timestamp),
                first_seven_base64_chars(&mark_replayer_event.creator.bytes()),
                mark_replayer_event.block_height,
                mark_replayer_event.report.matched,
                mark_replayer_event.report.modified
            )
        };
        Box::new(logger)
    }
}

impl Logger for SetRequiredBlockHeightEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |set_required_block_height_event: &SetRequiredBlockHeightEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                SET_REQUIRED_BLOCK_HEIGHT,
                secs_since_unix_epoch(set_required_block_height_event.timestamp),
                first_seven_base64_chars(&set_required_block_height_event.witness.bytes()),
                set_required_block_height_event.block_height,
                set_required_block_height_event.report.matched,
                set_required_block_height_event.report.modified
            )
        };
        Box::new(logger)
    }
}

impl Logger for SetEffectiveConfigurationEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |set_effective_configuration_event: &SetEffectiveConfigurationEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SET_EFFECTIVE_CONFIGURATION,
                secs_since_unix_epoch(set_effective_configuration_event.timestamp),
                first_seven_base64_chars(&set_effective_configuration_event.event.bytes()),
                set_effective_configuration_event.block_height,
                set_effective_configuration_event.sequence
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Clocks set before the Unix Epoch read as 0.
pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
