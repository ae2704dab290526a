//! Flow telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer. Nothing in the resolver, the
//! slot-filling machine or the dispatcher may read it back.
//!
//! # PRIVACY INVARIANT
//! Events carry names (intents, parameters, services) and counts only,
//! never utterance text or entity values.

pub mod event;
pub mod recorder;
