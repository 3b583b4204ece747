//! Strategy configuration tree.
//!
//! Serde types mirroring the declarative strategy document, plus the
//! YAML entry point that produces them. The loader is permissive where
//! the document format allows it: unknown keys are ignored, and scheme /
//! ring-mode strings are validated later, during strategy construction,
//! so a bad value degrades with a warning instead of rejecting the
//! whole strategy.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Root configuration for one selection strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Scheme filter for endpoint selection; free string, validated at
    /// strategy construction.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Whether the proxy may bypass to origin once parents are exhausted.
    #[serde(default = "default_true")]
    pub go_direct: bool,
    /// Whether parents are themselves proxies; reported verbatim to the
    /// transaction layer for Host-header handling.
    #[serde(default = "default_true")]
    pub parent_is_proxy: bool,
    /// Keep hosts that resolve to the local process in rotation.
    #[serde(default)]
    pub ignore_self_detect: bool,
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Host groups, outermost list ordered by failover tier.
    pub groups: Vec<Vec<HostConfig>>,
}

/// Failover policy for one strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Free string, validated at strategy construction.
    pub ring_mode: Option<String>,
    pub max_simple_retries: u32,
    /// Status codes classified as failures; validated at strategy
    /// construction.
    pub response_codes: Vec<u32>,
    /// Health-check styles the external prober should run
    /// (`active` / `passive`).
    pub health_check: Vec<String>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            ring_mode: None,
            max_simple_retries: 1,
            response_codes: Vec::new(),
            health_check: Vec::new(),
        }
    }
}

/// One host entry within a group.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub protocol: Vec<ProtocolConfig>,
    /// Relative hash-ring share; defaults to 1.0 at construction.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Overrides the hostname as the hash-ring seed.
    #[serde(default)]
    pub hash_string: Option<String>,
}

/// One endpoint entry within a host.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Free string, validated at strategy construction.
    #[serde(default)]
    pub scheme: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub health_check_url: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A parsed strategy document.
///
/// Strategies that failed typed decoding are carried as
/// [`Error::ConfigRejected`] so one bad strategy never aborts a reload.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub strategies: Vec<StrategyConfig>,
    pub rejected: Vec<Error>,
}

#[derive(Debug, Deserialize)]
struct DocumentRoot {
    #[serde(default)]
    strategy: Option<serde_yaml::Value>,
    #[serde(default)]
    strategies: Vec<serde_yaml::Value>,
}

/// Parses a YAML strategy document.
///
/// Accepts either a single `strategy:` mapping or a `strategies:`
/// sequence. YAML merge keys (`<<:`) are resolved before typed decoding,
/// matching how production documents share host blocks through anchors.
///
/// # Errors
///
/// Returns an error only when the document itself is unreadable; a
/// malformed individual strategy lands in [`ParsedDocument::rejected`].
pub fn parse_document(yaml: &str) -> Result<ParsedDocument> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    value.apply_merge()?;
    let root: DocumentRoot = serde_yaml::from_value(value)?;

    let mut doc = ParsedDocument::default();
    for node in root.strategy.into_iter().chain(root.strategies) {
        let name = node
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        match serde_yaml::from_value::<StrategyConfig>(node) {
            Ok(cfg) => doc.strategies.push(cfg),
            Err(e) => {
                tracing::warn!(strategy = %name, error = %e, "strategy failed to decode");
                doc.rejected.push(Error::ConfigRejected {
                    strategy: name,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_strategy() {
        let doc = parse_document(
            r#"
strategy:
  name: mid-tier
  scheme: http
  go_direct: false
  failover:
    ring_mode: exhaust_ring
    max_simple_retries: 3
    response_codes: [404, 503]
    health_check: [active, passive]
  groups:
    - - host: p1.example.com
        protocol:
          - scheme: http
            port: 8080
            health_check_url: http://p1.example.com/ping
        weight: 2.5
      - host: p2.example.com
        protocol:
          - scheme: http
            port: 8080
    - - host: s1.example.com
        protocol:
          - scheme: http
            port: 8080
        hash_string: slot-a
"#,
        )
        .unwrap();

        assert!(doc.rejected.is_empty());
        assert_eq!(doc.strategies.len(), 1);
        let cfg = &doc.strategies[0];
        assert_eq!(cfg.name, "mid-tier");
        assert_eq!(cfg.scheme.as_deref(), Some("http"));
        assert!(!cfg.go_direct);
        assert!(cfg.parent_is_proxy);
        assert_eq!(cfg.failover.ring_mode.as_deref(), Some("exhaust_ring"));
        assert_eq!(cfg.failover.max_simple_retries, 3);
        assert_eq!(cfg.failover.response_codes, vec![404, 503]);
        assert_eq!(cfg.groups.len(), 2);
        assert_eq!(cfg.groups[0].len(), 2);
        assert_eq!(cfg.groups[0][0].weight, Some(2.5));
        assert_eq!(
            cfg.groups[0][0].protocol[0].health_check_url.as_deref(),
            Some("http://p1.example.com/ping")
        );
        assert_eq!(cfg.groups[1][0].hash_string.as_deref(), Some("slot-a"));
    }

    #[test]
    fn test_parse_strategies_sequence() {
        let doc = parse_document(
            r#"
strategies:
  - name: first
    groups:
      - - host: a.example.com
          protocol: [{scheme: http, port: 80}]
  - name: second
    groups:
      - - host: b.example.com
          protocol: [{scheme: https, port: 443}]
"#,
        )
        .unwrap();

        assert!(doc.rejected.is_empty());
        let names: Vec<&str> = doc.strategies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_defaults_applied() {
        let doc = parse_document(
            r#"
strategy:
  name: bare
  groups:
    - - host: a.example.com
        protocol: [{scheme: http, port: 80}]
"#,
        )
        .unwrap();

        let cfg = &doc.strategies[0];
        assert_eq!(cfg.scheme, None);
        assert!(cfg.go_direct);
        assert!(cfg.parent_is_proxy);
        assert!(!cfg.ignore_self_detect);
        assert_eq!(cfg.failover.max_simple_retries, 1);
        assert!(cfg.failover.response_codes.is_empty());
        assert_eq!(cfg.groups[0][0].weight, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let doc = parse_document(
            r#"
strategy:
  name: tolerant
  some_future_knob: 7
  groups:
    - - host: a.example.com
        protocol: [{scheme: http, port: 80}]
        comment: primary rack
"#,
        )
        .unwrap();
        assert!(doc.rejected.is_empty());
        assert_eq!(doc.strategies.len(), 1);
    }

    #[test]
    fn test_merge_keys_resolved() {
        let doc = parse_document(
            r#"
hosts:
  - &p1
    host: p1.example.com
    protocol: [{scheme: http, port: 8080}]
strategy:
  name: merged
  groups:
    - - <<: *p1
        weight: 3.0
"#,
        )
        .unwrap();

        assert!(doc.rejected.is_empty());
        let host = &doc.strategies[0].groups[0][0];
        assert_eq!(host.host, "p1.example.com");
        assert_eq!(host.weight, Some(3.0));
        assert_eq!(host.protocol[0].port, 8080);
    }

    #[test]
    fn test_malformed_groups_rejects_strategy_only() {
        let doc = parse_document(
            r#"
strategies:
  - name: broken
    groups: not-a-sequence
  - name: healthy
    groups:
      - - host: a.example.com
          protocol: [{scheme: http, port: 80}]
"#,
        )
        .unwrap();

        assert_eq!(doc.strategies.len(), 1);
        assert_eq!(doc.strategies[0].name, "healthy");
        assert_eq!(doc.rejected.len(), 1);
        match &doc.rejected[0] {
            Error::ConfigRejected { strategy, .. } => assert_eq!(strategy, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_port_rejects_strategy() {
        let doc = parse_document(
            r#"
strategy:
  name: big-port
  groups:
    - - host: a.example.com
        protocol: [{scheme: http, port: 70000}]
"#,
        )
        .unwrap();
        assert!(doc.strategies.is_empty());
        assert_eq!(doc.rejected.len(), 1);
    }

    #[test]
    fn test_unreadable_document_is_an_error() {
        assert!(parse_document("{ unclosed").is_err());
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        let doc = parse_document("ignored_key: 1").unwrap();
        assert!(doc.strategies.is_empty());
        assert!(doc.rejected.is_empty());
    }
}
