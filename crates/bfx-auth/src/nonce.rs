//! Nonce generators
//!
//! The exchange rejects an `auth` request whose nonce is not larger than the
//! last one it saw for the key, so generators must never go backwards.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of strictly increasing nonces
pub trait NonceGenerator: Send + Sync + std::fmt::Debug {
    /// Produce the next nonce
    fn next(&self) -> String;
}

/// Microsecond wall-clock nonces, bumped past the previous value if the clock
/// stalls or steps back
#[derive(Debug, Default)]
pub struct EpochNonceGenerator {
    last: AtomicU64,
}

impl EpochNonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_micros() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or_default()
    }
}

impl NonceGenerator for EpochNonceGenerator {
    fn next(&self) -> String {
        let now = Self::now_micros();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Plain counter, for deterministic tests
#[derive(Debug)]
pub struct SequenceNonceGenerator {
    next: AtomicU64,
}

impl SequenceNonceGenerator {
    /// Start counting at `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl Default for SequenceNonceGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl NonceGenerator for SequenceNonceGenerator {
    fn next(&self) -> String {
        self.next.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_epoch_nonces_strictly_increase() {
        let generator = EpochNonceGenerator::new();
        let mut previous = 0u64;
        for _ in 0..1000 {
            let nonce: u64 = generator.next().parse().unwrap();
            assert!(nonce > previous);
            previous = nonce;
        }
    }

    #[test]
    fn test_epoch_nonce_is_numeric() {
        let nonce = EpochNonceGenerator::new().next();
        assert!(nonce.chars().all(|c| c.is_ascii_digit()));
        // Microseconds since the epoch: 16 digits until the year 2286
        assert_eq!(nonce.len(), 16);
    }

    #[test]
    fn test_epoch_nonces_unique_across_threads() {
        let generator = Arc::new(EpochNonceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..250).map(|_| generator.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce));
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_sequence_generator() {
        let generator = SequenceNonceGenerator::starting_at(7);
        assert_eq!(generator.next(), "7");
        assert_eq!(generator.next(), "8");
        assert_eq!(SequenceNonceGenerator::default().next(), "1");
    }
}
