//! Human-readable query tracking ids (`QR<digits>W`).

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashSet;
use rand::Rng;

const PREFIX: &str = "QR";
const SUFFIX: &str = "W";

/// Numeric space used while it is comfortably sparse.
const BASE_RANGE: u32 = 100_000;
/// Random draws remembered before switching to the sequence.
const SPARSE_LIMIT: usize = (BASE_RANGE / 2) as usize;

/// Issues tracking ids that are unique within the process.
///
/// Short ids are drawn at random from the base range until half of it is
/// taken. After that ids come from a sequence above the base range, seeded
/// at random, so memory stays bounded.
pub struct TrackingIds {
    issued: DashSet<u32>,
    next: AtomicU32,
}

impl Default for TrackingIds {
    fn default() -> Self {
        let seed = rand::thread_rng().gen_range(BASE_RANGE..u32::MAX / 2);
        Self {
            issued: DashSet::new(),
            next: AtomicU32::new(seed),
        }
    }
}

impl TrackingIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh id, retrying on collision.
    pub fn issue(&self) -> String {
        if self.issued.len() >= SPARSE_LIMIT {
            return format_id(self.next.fetch_add(1, Ordering::Relaxed));
        }
        let mut rng = rand::thread_rng();
        loop {
            let n = rng.gen_range(0..BASE_RANGE);
            if self.issued.insert(n) {
                return format_id(n);
            }
        }
    }

    /// Number of remembered random draws.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// A one-off id from the full numeric range, for redraws after a storage
/// collision.
pub fn redraw() -> String {
    format_id(rand::thread_rng().gen_range(BASE_RANGE..u32::MAX))
}

fn format_id(n: u32) -> String {
    format!("{PREFIX}{n}{SUFFIX}")
}

/// True when `id` has the `QR<digits>W` shape.
pub fn is_tracking_id(id: &str) -> bool {
    id.strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
