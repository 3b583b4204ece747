//! Host records: immutable descriptors of upstream parents.
//!
//! A record is built once at configuration load and never mutated.
//! Availability is not stored here; it is derived by asking the health
//! view for the record's hostname.

use std::fmt;

/// Transfer scheme of an upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    Http,
    Https,
    /// No scheme constraint. As a strategy scheme this disables endpoint
    /// filtering; as an endpoint scheme it matches nothing.
    #[default]
    None,
}

impl Scheme {
    /// Parses a configured scheme string. Unknown values return `None`
    /// so the caller can warn and degrade.
    pub(crate) fn parse(s: &str) -> Option<Scheme> {
        match s {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            "none" => Some(Scheme::None),
            _ => None,
        }
    }

    /// The configuration spelling of this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::None => "none",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint a parent listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub scheme: Scheme,
    pub port: u16,
    /// Probe URL for the external active health checker.
    pub health_check_url: Option<String>,
}

/// Immutable descriptor of one upstream parent.
///
/// `(group_index, host_index)` uniquely identifies the record within its
/// strategy and is how every other part of the engine refers to it.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub hostname: String,
    /// Endpoints in load order; never empty.
    pub protocols: Vec<Protocol>,
    /// Relative share of the group's hash ring, default 1.0.
    pub weight: f64,
    /// Overrides the hostname as the hash-ring seed when present.
    pub hash_string: Option<String>,
    pub group_index: u32,
    pub host_index: u32,
}

impl HostRecord {
    /// Seed used to place this host's virtual nodes on the hash ring.
    pub fn ring_seed(&self) -> &str {
        self.hash_string.as_deref().unwrap_or(&self.hostname)
    }

    /// Endpoint matching the given scheme, falling back to the first
    /// entry when nothing matches (or the filter is `Scheme::None`).
    pub fn endpoint_for(&self, scheme: Scheme) -> &Protocol {
        self.protocols
            .iter()
            .find(|p| scheme != Scheme::None && p.scheme == scheme)
            .unwrap_or(&self.protocols[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_host(hostname: &str, protocols: Vec<Protocol>) -> HostRecord {
        HostRecord {
            hostname: hostname.to_string(),
            protocols,
            weight: 1.0,
            hash_string: None,
            group_index: 0,
            host_index: 0,
        }
    }

    fn proto(scheme: Scheme, port: u16) -> Protocol {
        Protocol {
            scheme,
            port,
            health_check_url: None,
        }
    }

    #[test]
    fn test_scheme_parse_known_values() {
        assert_eq!(Scheme::parse("http"), Some(Scheme::Http));
        assert_eq!(Scheme::parse("https"), Some(Scheme::Https));
        assert_eq!(Scheme::parse("none"), Some(Scheme::None));
        assert_eq!(Scheme::parse("gopher"), None);
    }

    #[test]
    fn test_ring_seed_defaults_to_hostname() {
        let host = make_host("p1.example.com", vec![proto(Scheme::Http, 80)]);
        assert_eq!(host.ring_seed(), "p1.example.com");
    }

    #[test]
    fn test_ring_seed_prefers_hash_string() {
        let mut host = make_host("p1.example.com", vec![proto(Scheme::Http, 80)]);
        host.hash_string = Some("rack-7".to_string());
        assert_eq!(host.ring_seed(), "rack-7");
    }

    #[test]
    fn test_endpoint_for_matches_scheme() {
        let host = make_host(
            "p1.example.com",
            vec![proto(Scheme::Http, 8080), proto(Scheme::Https, 8443)],
        );
        assert_eq!(host.endpoint_for(Scheme::Https).port, 8443);
        assert_eq!(host.endpoint_for(Scheme::Http).port, 8080);
    }

    #[test]
    fn test_endpoint_for_falls_back_to_first() {
        let host = make_host("p1.example.com", vec![proto(Scheme::Http, 8080)]);
        // No https endpoint configured, first entry wins.
        assert_eq!(host.endpoint_for(Scheme::Https).port, 8080);
    }

    #[test]
    fn test_endpoint_for_none_scheme_takes_first() {
        let host = make_host(
            "p1.example.com",
            vec![proto(Scheme::Https, 8443), proto(Scheme::Http, 8080)],
        );
        assert_eq!(host.endpoint_for(Scheme::None).port, 8443);
    }
}
