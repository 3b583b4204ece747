//! Next-hop selection engine for HTTP forward and reverse proxies.
//!
//! For each inbound transaction the engine decides which upstream parent
//! to route to, with what scheme and port, and which parent to try next
//! when an attempt fails, until policy says stop or fall through to
//! origin. Selection is a weighted consistent hash over multi-ring host
//! topologies; retries walk the rings under a per-strategy ring mode and
//! a bounded retry budget.
//!
//! The engine opens no sockets and parses no HTTP. It consumes a narrow
//! request-context view, reads host availability through [`HealthView`],
//! and reports attempt outcomes back through the same interface.
//!
//! ```
//! use std::sync::Arc;
//! use nexthop_select::{HealthView, HostStatusStore, NoSelfDetect, StrategyTable};
//!
//! let doc = r#"
//! strategy:
//!   name: mid-tier
//!   scheme: http
//!   failover:
//!     ring_mode: exhaust_ring
//!     max_simple_retries: 2
//!     response_codes: [503]
//!   groups:
//!     - - host: p1.example.com
//!         protocol: [{scheme: http, port: 8080}]
//! "#;
//!
//! let health: Arc<dyn HealthView> = Arc::new(HostStatusStore::new());
//! let table = StrategyTable::new();
//! let (_, errors) = table.load_document(doc, &health, &NoSelfDetect).unwrap();
//! assert!(errors.is_empty());
//!
//! let strategy = table.get("mid-tier").unwrap();
//! assert!(strategy.next_hop_exists());
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod store;
pub mod strategy;

pub use error::{Error, Result};
pub use health::{DownReason, HealthView, HostStatusStore};
pub use store::StrategyTable;
pub use strategy::{
    Decision, HealthChecks, HostRecord, NextHopStrategy, NoSelfDetect, Outcome, ParentResult,
    Protocol, RequestContext, ResponseCodes, RingMode, Scheme, Scratchpad, SelfDetect,
    STATUS_CONNECTION_FAILURE,
};
