//! Tiered snapshot retention.
//!
//! Recent history keeps every chunk; older history is thinned out
//! geometrically. With tier width `N` the newest `N` or so chunks are all
//! kept, the tier before that keeps every 2nd chunk, the one before that
//! every 4th, and so on, so `k` captured chunks cost `O(N log k)` memory.
//! The oldest chunk is always kept so the start of the event log can still
//! be reached.

use crate::history::Chunks;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    tier_width: u32,
}

impl RetentionPolicy {
    pub fn new(tier_width: u32) -> Self {
        assert!(tier_width > 0, "retention tier width must be at least 1");
        RetentionPolicy { tier_width }
    }

    pub fn tier_width(&self) -> u32 { self.tier_width }

    /// Prune after chunk `count` has been captured.
    ///
    /// Each call removes at most one chunk per tier. Chunk `count - d` with
    /// `d = N, 3N+1, 7N+3, ...` is the one that just fell out of its tier;
    /// the number of tiers touched is the number of trailing one bits of
    /// `count + N`. Returns how many chunks were removed.
    pub fn drop_old_snapshots(&self, chunks: &mut Chunks, count: u32) -> usize {
        let n = u64::from(self.tier_width);
        let count = u64::from(count);
        let first = chunks.keys().next().copied();

        let mut y = (count + n) ^ (count + n + 1);
        let mut d = n;
        let mut d2 = 2 * n + 1;
        let mut dropped = 0;
        loop {
            y >>= 1;
            if y == 0 || count < d {
                return dropped;
            }
            // keys are u32, and count - d < count
            let key = (count - d) as u32;
            if Some(key) != first && chunks.remove(&key).is_some() {
                trace!(key, "dropped snapshot");
                dropped += 1;
            }
            d += d2;
            d2 *= 2;
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self { RetentionPolicy::new(crate::DEFAULT_TIER_WIDTH) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ReverseChunk;
    use crate::snapshot::SnapshotBlob;
    use crate::time::EmuTime;

    /// Capture chunks 1..=total (time == key), pruning after each one.
    fn simulate(policy: RetentionPolicy, total: u32) -> Chunks {
        let mut chunks = Chunks::new();
        for key in 1..=total {
            chunks.insert(key, ReverseChunk {
                time: EmuTime::from_ticks(u64::from(key)),
                snapshot: SnapshotBlob::from_bytes(Vec::new()),
                event_count: key as usize,
            });
            policy.drop_old_snapshots(&mut chunks, key);
        }
        chunks
    }

    #[test]
    fn test_tier_layout() {
        let chunks = simulate(RetentionPolicy::new(4), 100);
        let keys: Vec<u32> = chunks.keys().copied().collect();
        assert_eq!(keys, vec![
            1, 16, 32, 40, 48, 56, 64, 72, 76, 80, 84, 88, 90, 92, 94, 96, 97, 98, 99, 100,
        ]);
    }

    #[test]
    fn test_recent_chunks_dense() {
        let chunks = simulate(RetentionPolicy::new(25), 30);
        assert_eq!(chunks.len(), 28);
        assert!((7..=30).all(|k| chunks.contains_key(&k)));
    }

    #[test]
    fn test_logarithmic_growth() {
        let policy = RetentionPolicy::new(4);
        assert_eq!(simulate(policy, 1000).len(), 36);
        assert_eq!(simulate(RetentionPolicy::new(25), 100).len(), 57);
    }

    #[test]
    fn test_first_chunk_kept_and_ordered() {
        for n in [1, 2, 4, 25] {
            let chunks = simulate(RetentionPolicy::new(n), 500);
            assert_eq!(chunks.keys().next(), Some(&1));
            assert_eq!(chunks.keys().next_back(), Some(&500));
            let times: Vec<EmuTime> = chunks.values().map(|c| c.time).collect();
            assert!(times.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_small_history_untouched() {
        let chunks = simulate(RetentionPolicy::default(), 10);
        assert_eq!(chunks.len(), 10);
    }
}
