//! Response-code classification for retry decisions.

/// Sentinel outcome code for connection failures.
///
/// Lies outside every valid HTTP status range and is always a member of
/// the failure set: a parent that cannot be reached is retryable whenever
/// retries remain.
pub const STATUS_CONNECTION_FAILURE: u32 = 0x1_0000;

/// Sorted, deduplicated set of status codes treated as failures.
///
/// Built once at load; membership checks are binary searches over the
/// sorted backing vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCodes {
    codes: Vec<u32>,
}

impl ResponseCodes {
    /// Builds the set from configured codes.
    ///
    /// Codes outside the open interval (300, 599) are dropped with a
    /// warning. The connection-failure sentinel is always included.
    pub fn new(strategy: &str, configured: &[u32]) -> Self {
        let mut codes = vec![STATUS_CONNECTION_FAILURE];
        for &code in configured {
            if code > 300 && code < 599 {
                codes.push(code);
            } else {
                tracing::warn!(strategy, code, "skipping invalid response code");
            }
        }
        codes.sort_unstable();
        codes.dedup();
        Self { codes }
    }

    /// Whether the code counts as a failure for retry purposes.
    pub fn contains(&self, code: u32) -> bool {
        self.codes.binary_search(&code).is_ok()
    }

    /// The member codes in ascending order, sentinel included.
    pub fn codes(&self) -> &[u32] {
        &self.codes
    }
}
