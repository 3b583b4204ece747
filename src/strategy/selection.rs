//! The selection strategy: ring policy, retry predicates, and outcome
//! feedback.
//!
//! A strategy is built once from its configuration and is immutable
//! afterwards; it can be shared across any number of concurrent
//! transactions without locking. All per-transaction state lives on the
//! caller-owned scratchpad.

use std::sync::Arc;

use crate::config::{HostConfig, StrategyConfig};
use crate::error::{Error, Result};
use crate::health::{DownReason, HealthView};

use super::codes::ResponseCodes;
use super::host::{HostRecord, Protocol, Scheme};
use super::ring::HostGroup;
use super::transaction::{
    fingerprint_of, Decision, Outcome, ParentResult, RequestContext, Scratchpad,
};

/// Upper bound on host groups per strategy; excess groups are dropped
/// with a warning.
pub const MAX_GROUP_RINGS: usize = 32;

/// How retries move between host groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RingMode {
    /// Round-robin across groups: each retry targets the next group.
    #[default]
    AlternateRing,
    /// Drain every available host in the current group before advancing.
    ExhaustRing,
}

impl RingMode {
    pub(crate) fn parse(s: &str) -> Option<RingMode> {
        match s {
            "alternate_ring" => Some(RingMode::AlternateRing),
            "exhaust_ring" => Some(RingMode::ExhaustRing),
            _ => None,
        }
    }

    /// The configuration spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            RingMode::AlternateRing => "alternate_ring",
            RingMode::ExhaustRing => "exhaust_ring",
        }
    }
}

/// Which health-check styles the external prober should run for this
/// strategy's hosts. The engine stores and reports these; probing itself
/// happens elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthChecks {
    pub active: bool,
    pub passive: bool,
}

/// Load-time hook that claims hostnames resolving to the local process.
///
/// A claimed host is marked down with [`DownReason::SelfDetect`] during
/// strategy construction, unless the strategy sets `ignore_self_detect`.
pub trait SelfDetect {
    fn is_self(&self, hostname: &str) -> bool;
}

/// Default detector that never claims a host.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSelfDetect;

impl SelfDetect for NoSelfDetect {
    fn is_self(&self, _hostname: &str) -> bool {
        false
    }
}

/// A named next-hop selection policy: host group rings plus the retry
/// and failover rules that drive picks across them.
pub struct NextHopStrategy {
    name: String,
    scheme: Scheme,
    go_direct: bool,
    parent_is_proxy: bool,
    ignore_self_detect: bool,
    ring_mode: RingMode,
    max_simple_retries: u32,
    resp_codes: ResponseCodes,
    health_checks: HealthChecks,
    groups: Vec<HostGroup>,
    num_parents: u32,
    health: Arc<dyn HealthView>,
}

impl std::fmt::Debug for NextHopStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextHopStrategy")
            .field("name", &self.name)
            .field("scheme", &self.scheme)
            .field("go_direct", &self.go_direct)
            .field("parent_is_proxy", &self.parent_is_proxy)
            .field("ignore_self_detect", &self.ignore_self_detect)
            .field("ring_mode", &self.ring_mode)
            .field("max_simple_retries", &self.max_simple_retries)
            .field("resp_codes", &self.resp_codes)
            .field("health_checks", &self.health_checks)
            .field("groups", &self.groups)
            .field("num_parents", &self.num_parents)
            .finish()
    }
}

fn reject(strategy: &str, reason: impl Into<String>) -> Error {
    Error::ConfigRejected {
        strategy: strategy.to_string(),
        reason: reason.into(),
    }
}

fn build_host(
    strategy: &str,
    group_index: u32,
    host_index: u32,
    cfg: HostConfig,
) -> Result<HostRecord> {
    if cfg.host.is_empty() {
        return Err(reject(strategy, "host with empty hostname"));
    }
    if cfg.protocol.is_empty() {
        return Err(reject(
            strategy,
            format!("host '{}' has no protocols", cfg.host),
        ));
    }

    let mut protocols = Vec::with_capacity(cfg.protocol.len());
    for p in cfg.protocol {
        if p.port == 0 {
            return Err(reject(
                strategy,
                format!("host '{}' has an invalid port 0", cfg.host),
            ));
        }
        let scheme = match p.scheme.as_deref() {
            None => Scheme::None,
            Some(s) => Scheme::parse(s).unwrap_or_else(|| {
                tracing::warn!(
                    strategy,
                    host = %cfg.host,
                    value = s,
                    "invalid protocol scheme, using none"
                );
                Scheme::None
            }),
        };
        protocols.push(Protocol {
            scheme,
            port: p.port,
            health_check_url: p.health_check_url,
        });
    }

    let weight = match cfg.weight {
        Some(w) if w > 0.0 => w,
        Some(w) => {
            return Err(reject(
                strategy,
                format!("host '{}' has a non-positive weight {w}", cfg.host),
            ));
        }
        None => {
            tracing::debug!(strategy, host = %cfg.host, "no weight defined, using default 1.0");
            1.0
        }
    };

    Ok(HostRecord {
        hostname: cfg.host,
        protocols,
        weight,
        hash_string: cfg.hash_string,
        group_index,
        host_index,
    })
}

impl NextHopStrategy {
    /// Builds a strategy from its configuration tree.
    ///
    /// Recoverable problems (unknown scheme or ring mode, invalid
    /// response codes, excess groups) degrade with a warning. Structural
    /// problems (no groups, an empty group, a host without endpoints)
    /// reject the strategy as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRejected`] when the configuration cannot
    /// produce a usable strategy.
    pub fn from_config(
        cfg: StrategyConfig,
        health: Arc<dyn HealthView>,
        detector: &dyn SelfDetect,
    ) -> Result<Self> {
        let name = cfg.name;
        if name.is_empty() {
            return Err(reject("<unnamed>", "empty strategy name"));
        }

        let scheme = match cfg.scheme.as_deref() {
            None => Scheme::None,
            Some(s) => Scheme::parse(s).unwrap_or_else(|| {
                tracing::warn!(strategy = %name, value = s, "invalid scheme, using none");
                Scheme::None
            }),
        };

        let ring_mode = match cfg.failover.ring_mode.as_deref() {
            None => RingMode::AlternateRing,
            Some(s) => RingMode::parse(s).unwrap_or_else(|| {
                tracing::warn!(
                    strategy = %name,
                    value = s,
                    "invalid ring_mode, using alternate_ring"
                );
                RingMode::AlternateRing
            }),
        };

        let resp_codes = ResponseCodes::new(&name, &cfg.failover.response_codes);

        let mut health_checks = HealthChecks::default();
        for check in &cfg.failover.health_check {
            match check.as_str() {
                "active" => health_checks.active = true,
                "passive" => health_checks.passive = true,
                _ => {}
            }
        }

        if cfg.groups.is_empty() {
            return Err(reject(&name, "no host groups defined"));
        }
        let mut group_configs = cfg.groups;
        if group_configs.len() > MAX_GROUP_RINGS {
            tracing::warn!(
                strategy = %name,
                configured = group_configs.len(),
                max = MAX_GROUP_RINGS,
                "groups list exceeds the maximum, dropping the excess"
            );
            group_configs.truncate(MAX_GROUP_RINGS);
        }

        let mut groups = Vec::with_capacity(group_configs.len());
        let mut num_parents = 0u32;
        for (grp, host_configs) in group_configs.into_iter().enumerate() {
            if host_configs.is_empty() {
                return Err(reject(&name, format!("group {grp} has no hosts")));
            }
            let mut hosts = Vec::with_capacity(host_configs.len());
            for (hst, host_config) in host_configs.into_iter().enumerate() {
                let record = build_host(&name, grp as u32, hst as u32, host_config)?;
                if !cfg.ignore_self_detect && detector.is_self(&record.hostname) {
                    tracing::info!(
                        strategy = %name,
                        host = %record.hostname,
                        "host resolves to this process, marking down"
                    );
                    health.mark_down(&record.hostname, DownReason::SelfDetect);
                }
                num_parents += 1;
                hosts.push(record);
            }
            groups.push(HostGroup::new(hosts));
        }

        Ok(Self {
            name,
            scheme,
            go_direct: cfg.go_direct,
            parent_is_proxy: cfg.parent_is_proxy,
            ignore_self_detect: cfg.ignore_self_detect,
            ring_mode,
            max_simple_retries: cfg.failover.max_simple_retries,
            resp_codes,
            health_checks,
            groups,
            num_parents,
            health,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Whether the proxy may bypass to origin once parents are exhausted.
    pub fn go_direct(&self) -> bool {
        self.go_direct
    }

    /// Whether parents are themselves proxies; drives Host-header
    /// handling in the transaction layer, reported verbatim.
    pub fn parent_is_proxy(&self) -> bool {
        self.parent_is_proxy
    }

    pub fn ignore_self_detect(&self) -> bool {
        self.ignore_self_detect
    }

    pub fn ring_mode(&self) -> RingMode {
        self.ring_mode
    }

    pub fn max_simple_retries(&self) -> u32 {
        self.max_simple_retries
    }

    pub fn health_checks(&self) -> HealthChecks {
        self.health_checks
    }

    pub fn response_codes(&self) -> &ResponseCodes {
        &self.resp_codes
    }

    /// Total host count across all groups.
    pub fn num_parents(&self) -> u32 {
        self.num_parents
    }

    /// Host group rings in failover-tier order.
    pub fn groups(&self) -> &[HostGroup] {
        &self.groups
    }

    /// Creates the per-transaction scratchpad sized for this strategy.
    pub fn new_scratchpad(&self) -> Scratchpad {
        let sizes: Vec<u32> = self.groups.iter().map(|g| g.len() as u32).collect();
        Scratchpad::new(&sizes)
    }

    /// Whether any host across all groups is currently available.
    pub fn next_hop_exists(&self) -> bool {
        self.groups
            .iter()
            .flat_map(|g| g.iter())
            .any(|h| self.health.is_available(&h.hostname))
    }

    /// Whether the status code counts as a failure for retry purposes.
    pub fn code_is_failure(&self, code: u32) -> bool {
        self.resp_codes.contains(code)
    }

    /// Whether a failed attempt warrants another one, given how many
    /// retries the transaction has already spent.
    pub fn response_is_retryable(&self, retry_attempts: u32, code: u32) -> bool {
        self.code_is_failure(code)
            && retry_attempts < self.max_simple_retries
            && retry_attempts < self.num_parents
    }

    /// Whether a failure status should take the parent out of rotation.
    pub fn on_failure_mark_parent_down(&self, code: u32) -> bool {
        (500..=599).contains(&code)
    }

    /// Picks a parent for the current attempt.
    ///
    /// Every pick is recorded on the scratchpad; no `(group, host)` pair
    /// is returned twice within one transaction, and hosts the health
    /// view reports down at pick time are never returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoParentAvailable`] once the retry budget or the
    /// parent list is exhausted. The caller then consults `go_direct`.
    pub fn find_next_hop(
        &self,
        req: &dyn RequestContext,
        scratch: &mut Scratchpad,
    ) -> Result<ParentResult> {
        let txn = req.transaction_id();

        if scratch.attempts > self.max_simple_retries || scratch.attempts >= self.num_parents {
            tracing::debug!(
                txn,
                attempts = scratch.attempts,
                "retry budget exhausted, no parent"
            );
            return Err(Error::NoParentAvailable);
        }

        let fingerprint = match scratch.fingerprint {
            Some(fp) => fp,
            None => {
                let fp = fingerprint_of(req.fingerprint_key());
                scratch.fingerprint = Some(fp);
                fp
            }
        };

        let pick = match self.ring_mode {
            RingMode::ExhaustRing => self.pick_exhaust(fingerprint, scratch),
            RingMode::AlternateRing => self.pick_alternate(fingerprint, scratch),
        };

        match pick {
            Some((group, host)) => {
                scratch.visit(group, host);
                scratch.last = Some((group, host));
                let attempt = scratch.attempts;
                scratch.attempts += 1;

                let record = self.groups[group as usize].at(host as usize);
                let endpoint = record.endpoint_for(self.scheme);
                tracing::debug!(
                    txn,
                    attempt,
                    group,
                    host = %record.hostname,
                    port = endpoint.port,
                    "selected next hop"
                );
                Ok(ParentResult {
                    hostname: record.hostname.clone(),
                    port: endpoint.port,
                    scheme: endpoint.scheme,
                    is_retry: attempt > 0,
                    attempt,
                })
            }
            None => {
                tracing::debug!(txn, "parent groups exhausted, no parent");
                Err(Error::NoParentAvailable)
            }
        }
    }

    /// Records the outcome of the scratchpad's last pick, possibly
    /// marking the parent down (or up) in the health store.
    pub fn mark(&self, req: &dyn RequestContext, scratch: &Scratchpad, outcome: Outcome) {
        let txn = req.transaction_id();
        let Some((group, host)) = scratch.last else {
            tracing::warn!(txn, "mark called before any pick");
            return;
        };
        let record = self.groups[group as usize].at(host as usize);

        match outcome {
            Outcome::ConnectFailure => {
                tracing::debug!(txn, host = %record.hostname, "connect failure");
                self.health
                    .mark_down(&record.hostname, DownReason::ConnectFail);
            }
            Outcome::Status(code) if self.code_is_failure(code) => {
                if self.on_failure_mark_parent_down(code) {
                    tracing::debug!(txn, host = %record.hostname, code, "failure response");
                    self.health
                        .mark_down(&record.hostname, DownReason::Passive5xx);
                }
            }
            Outcome::Status(_) => {
                self.health.mark_up(&record.hostname);
            }
        }
    }

    /// What the proxy should do after the given outcome.
    pub fn should_retry(&self, scratch: &Scratchpad, outcome: Outcome) -> Decision {
        let code = outcome.code();
        let retries = scratch.attempts.saturating_sub(1);
        if self.response_is_retryable(retries, code) {
            Decision::Retry
        } else if self.code_is_failure(code) && self.go_direct {
            Decision::GoDirect
        } else {
            Decision::Fail
        }
    }

    /// First available, unvisited host in ring order within one group.
    /// Unavailable hosts hit during the scan are burned as visited so
    /// they are never reconsidered within the transaction.
    fn pick_in_group(&self, group: u32, fingerprint: u64, scratch: &mut Scratchpad) -> Option<u32> {
        let ring = self.groups[group as usize].ring();
        loop {
            let host = ring.next(fingerprint, |h| scratch.visited(group, h))?;
            let record = self.groups[group as usize].at(host as usize);
            if self.health.is_available(&record.hostname) {
                return Some(host);
            }
            scratch.visit(group, host);
            tracing::debug!(group, host = %record.hostname, "skipping unavailable parent");
        }
    }

    fn pick_exhaust(&self, fingerprint: u64, scratch: &mut Scratchpad) -> Option<(u32, u32)> {
        while (scratch.group_cursor as usize) < self.groups.len() {
            let group = scratch.group_cursor;
            if let Some(host) = self.pick_in_group(group, fingerprint, scratch) {
                return Some((group, host));
            }
            scratch.group_cursor += 1;
        }
        None
    }

    fn pick_alternate(&self, fingerprint: u64, scratch: &mut Scratchpad) -> Option<(u32, u32)> {
        let count = self.groups.len() as u32;
        let start = match scratch.last {
            Some((group, _)) => (group + 1) % count,
            None => 0,
        };
        for i in 0..count {
            let group = (start + i) % count;
            if let Some(host) = self.pick_in_group(group, fingerprint, scratch) {
                return Some((group, host));
            }
        }
        None
    }
}
