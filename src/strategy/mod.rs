//! Next-hop strategy evaluation.
//!
//! Provides the host-record model, the weighted consistent-hash rings,
//! and the per-transaction retry state machine that picks which parent
//! a transaction goes to next.

mod codes;
mod host;
mod ring;
mod selection;
mod transaction;

pub use codes::{ResponseCodes, STATUS_CONNECTION_FAILURE};
pub use host::{HostRecord, Protocol, Scheme};
pub use ring::{HashRing, HostGroup};
pub use selection::{
    HealthChecks, NextHopStrategy, NoSelfDetect, RingMode, SelfDetect, MAX_GROUP_RINGS,
};
pub use transaction::{Decision, Outcome, ParentResult, RequestContext, Scratchpad};
