//! Host group rings and the weighted consistent-hash selector.
//!
//! Each group owns a ring of virtual nodes keyed on the hosts' ring
//! seeds. Placement uses SipHash-1-3 with fixed keys, so a given
//! configuration produces the same ring on every process start.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use super::host::HostRecord;

/// Virtual ring points per unit of host weight.
const POINTS_PER_WEIGHT: f64 = 256.0;

/// Hashes one virtual node position for a host seed.
fn ring_point(seed: &str, replica: u32) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(seed.as_bytes());
    hasher.write_u32(replica);
    hasher.finish()
}

#[derive(Debug, Clone, Copy)]
struct RingPoint {
    point: u64,
    host: u32,
    replica: u32,
}

/// Weighted consistent-hash ring over one host group.
///
/// Lookups walk the ring clockwise from the request fingerprint. Equal
/// points order by (host index, replica index) ascending.
#[derive(Debug)]
pub struct HashRing {
    points: Vec<RingPoint>,
}

impl HashRing {
    fn build(hosts: &[HostRecord]) -> Self {
        let mut points = Vec::new();
        for (index, host) in hosts.iter().enumerate() {
            let replicas = ((host.weight * POINTS_PER_WEIGHT).ceil() as u32).max(1);
            for replica in 0..replicas {
                points.push(RingPoint {
                    point: ring_point(host.ring_seed(), replica),
                    host: index as u32,
                    replica,
                });
            }
        }
        points.sort_unstable_by_key(|p| (p.point, p.host, p.replica));
        Self { points }
    }

    /// Host owning the first virtual node at or after the fingerprint,
    /// wrapping around the ring. `None` only for an empty ring.
    pub fn first(&self, fingerprint: u64) -> Option<u32> {
        self.next(fingerprint, |_| false)
    }

    /// First host in ring order from the fingerprint for which `skip`
    /// is false. `None` when every host is skipped.
    pub fn next<F>(&self, fingerprint: u64, skip: F) -> Option<u32>
    where
        F: Fn(u32) -> bool,
    {
        if self.points.is_empty() {
            return None;
        }
        let start = self.points.partition_point(|p| p.point < fingerprint);
        for i in 0..self.points.len() {
            let p = &self.points[(start + i) % self.points.len()];
            if !skip(p.host) {
                return Some(p.host);
            }
        }
        None
    }
}

/// One ordered, non-empty group of host records plus its hash ring.
///
/// Order matches load order. The group is the single owner of its
/// records; everything else refers to them by `(group, host)` indices.
#[derive(Debug)]
pub struct HostGroup {
    hosts: Vec<HostRecord>,
    ring: HashRing,
}

impl HostGroup {
    pub(crate) fn new(hosts: Vec<HostRecord>) -> Self {
        let ring = HashRing::build(&hosts);
        Self { hosts, ring }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// The record at the given load-order position.
    pub fn at(&self, index: usize) -> &HostRecord {
        &self.hosts[index]
    }

    /// Records in load order.
    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.hosts.iter()
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}
