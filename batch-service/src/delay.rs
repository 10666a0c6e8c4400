use redpost_core::CoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive range of whole seconds to wait between two submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub from_secs: u64,
    pub up_to_secs: u64,
}

impl DelayRange {
    /// Rejects an inverted range.
    pub fn new(from_secs: u64, up_to_secs: u64) -> Result<Self, CoreError> {
        if from_secs > up_to_secs {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "delay lower bound ({}s) exceeds upper bound ({}s)",
                    from_secs, up_to_secs
                ),
            });
        }
        Ok(Self {
            from_secs,
            up_to_secs,
        })
    }

    pub fn fixed(secs: u64) -> Self {
        Self {
            from_secs: secs,
            up_to_secs: secs,
        }
    }

    pub fn sample(&self) -> Duration {
        Duration::from_secs(sample_delay_secs(self.from_secs, self.up_to_secs))
    }
}

/// Uniform pick from `[from, up_to]`. When `from >= up_to` the result is
/// always `from`.
pub fn sample_delay_secs(from: u64, up_to: u64) -> u64 {
    if from >= up_to {
        from
    } else {
        fastrand::u64(from..=up_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_in_range() {
        let range = DelayRange::new(2, 5).unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let d = range.sample().as_secs();
            assert!((2..=5).contains(&d));
            seen.insert(d);
        }
        // Both ends are reachable
        assert!(seen.contains(&2) && seen.contains(&5));
    }

    #[test]
    fn test_inverted_range_clamps_to_lower_bound() {
        let inverted = DelayRange {
            from_secs: 7,
            up_to_secs: 3,
        };
        for _ in 0..50 {
            assert_eq!(inverted.sample(), Duration::from_secs(7));
        }
        assert_eq!(sample_delay_secs(4, 4), 4);
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(matches!(
            DelayRange::new(10, 1),
            Err(CoreError::InvalidInput { .. })
        ));
        assert_eq!(DelayRange::new(0, 0).unwrap(), DelayRange::fixed(0));
    }
}
