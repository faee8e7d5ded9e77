/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events the ledger emits when its persistent state changes.
//!
//! An event for a given action indicates that the action has been completed and written. Events are
//! sent to the optional event publisher passed to
//! [`EventLedger::new`](crate::ledger::accessors::internal::EventLedger::new), and logged if
//! [`log_events`](crate::config::Configuration::log_events) is set.

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    ledger::accessors::internal::MarkReport,
    types::{
        block::Block,
        data_types::{BlockHeight, BlockOrder, ConfigSequence, CryptoHash, LocalEventNumber, PeerId},
        event::EventType,
    },
};

pub enum LedgerEvent {
    InsertEvent(InsertEventEvent),
    InsertBlock(InsertBlockEvent),
    SetConsensus(SetConsensusEvent),
    MarkReplayer(MarkReplayerEvent),
    SetRequiredBlockHeight(SetRequiredBlockHeightEvent),
    SetEffectiveConfiguration(SetEffectiveConfigurationEvent),
}

impl LedgerEvent {
    pub(crate) fn publish(
        event_publisher: &Option<Sender<LedgerEvent>>,
        log_events: bool,
        event: LedgerEvent,
    ) {
        if log_events {
            event.log();
        }
        if let Some(event_publisher) = event_publisher {
            // A dropped receiver only means nobody is listening anymore.
            let _ = event_publisher.send(event);
        }
    }
}

pub struct InsertEventEvent {
    pub timestamp: SystemTime,
    pub event: CryptoHash,
    pub event_type: EventType,
    pub local_event_number: LocalEventNumber,
}

pub struct InsertBlockEvent {
    pub timestamp: SystemTime,
    pub block: Block,
}

pub struct SetConsensusEvent {
    pub timestamp: SystemTime,
    pub event: CryptoHash,
    pub block_height: BlockHeight,
    pub block_order: BlockOrder,
}

pub struct MarkReplayerEvent {
    pub timestamp: SystemTime,
    pub creator: PeerId,
    /// The height at which the creator was first confirmed as a replayer. This is lower than the
    /// height passed to `mark_new_replayers` if the creator had been marked before.
    pub block_height: BlockHeight,
    pub report: MarkReport,
}

pub struct SetRequiredBlockHeightEvent {
    pub timestamp: SystemTime,
    pub witness: PeerId,
    pub block_height: BlockHeight,
    pub report: MarkReport,
}

pub struct SetEffectiveConfigurationEvent {
    pub timestamp: SystemTime,
    pub event: CryptoHash,
    pub block_height: BlockHeight,
    pub sequence: ConfigSequence,
}
