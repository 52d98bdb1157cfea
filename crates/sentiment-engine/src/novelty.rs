//! Near-duplicate detection via 64-bit SimHash.

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

/// 64-bit SimHash of text over normalized word tokens.
pub fn simhash_64(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }

    let mut v = [0i32; 64];
    for token in tokenize(text) {
        let h = token_hash(&token);
        for (i, slot) in v.iter_mut().enumerate() {
            if (h >> i) & 1 == 1 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut result = 0u64;
    for (i, slot) in v.iter().enumerate() {
        if *slot > 0 {
            result |= 1 << i;
        }
    }
    result
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|word| {
        let clean: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if clean.is_empty() {
            None
        } else {
            Some(clean)
        }
    })
}

fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().unwrap())
}

/// Number of differing bits between two hashes.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Bounded FIFO index of seen content hashes.
///
/// A hash within `threshold_bits` of any remembered hash is a duplicate.
/// Memory is capped at `max_size`; the oldest hash is evicted first.
#[derive(Debug)]
pub struct NoveltyIndex {
    threshold_bits: u32,
    max_size: usize,
    seen: VecDeque<u64>,
    total_checked: u64,
    novel_count: u64,
}

impl NoveltyIndex {
    pub fn new(threshold_bits: u32, max_size: usize) -> Self {
        Self {
            threshold_bits,
            max_size: max_size.max(1),
            seen: VecDeque::new(),
            total_checked: 0,
            novel_count: 0,
        }
    }

    /// Check a hash for novelty and remember it.
    pub fn observe(&mut self, hash: u64) -> bool {
        self.total_checked += 1;
        let novel = !self
            .seen
            .iter()
            .any(|existing| hamming(hash, *existing) <= self.threshold_bits);

        if novel {
            self.novel_count += 1;
        }
        if self.seen.len() == self.max_size {
            self.seen.pop_front();
        }
        self.seen.push_back(hash);
        novel
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Fraction of observed content that was novel, in [0, 1].
    pub fn novelty_rate(&self) -> f64 {
        if self.total_checked == 0 {
            return 1.0;
        }
        self.novel_count as f64 / self.total_checked as f64
    }
}

impl Default for NoveltyIndex {
    fn default() -> Self {
        Self::new(6, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_hashes_identically() {
        let a = simhash_64("Apple beats earnings expectations");
        let b = simhash_64("Apple beats earnings expectations");
        assert_eq!(a, b);
    }

    #[test]
    fn near_duplicates_are_close_in_hamming_distance() {
        let a = simhash_64("Apple beats quarterly earnings expectations again this year");
        let b = simhash_64("Apple beats quarterly earnings expectations again this quarter");
        let c = simhash_64("Oil futures slide on inventory build and weak demand");
        assert!(hamming(a, b) < hamming(a, c));
    }

    #[test]
    fn punctuation_and_case_are_normalized() {
        let a = simhash_64("Fed holds rates steady!");
        let b = simhash_64("fed holds rates steady");
        assert_eq!(a, b);
    }

    #[test]
    fn index_flags_repeats_as_duplicates() {
        let mut index = NoveltyIndex::new(6, 100);
        let hash = simhash_64("Breaking: merger announced");
        assert!(index.observe(hash));
        assert!(!index.observe(hash));
        assert!((index.novelty_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn memory_is_bounded_fifo() {
        let mut index = NoveltyIndex::new(0, 2);
        index.observe(0b0001);
        index.observe(0b0010);
        index.observe(0b0100); // evicts 0b0001
        assert_eq!(index.len(), 2);
        // The evicted hash is novel again
        assert!(index.observe(0b0001));
    }

    #[test]
    fn novelty_rate_stays_in_unit_interval() {
        let mut index = NoveltyIndex::default();
        for i in 0..50u64 {
            index.observe(i.wrapping_mul(0x9e3779b97f4a7c15));
        }
        let rate = index.novelty_rate();
        assert!((0.0..=1.0).contains(&rate));
    }
}
