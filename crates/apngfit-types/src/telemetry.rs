use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the budgeted palette/posterize search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStage {
    /// Palette ladder of the requested quality tier.
    TierLadder,
    /// Remaining allowed palette sizes not covered by the tier ladder.
    RemainingPalettes,
    /// Full allowed palette set over posterized buffers.
    Posterized,
    /// Most aggressive allowed settings after every attempt missed the budget.
    Fallback,
}

/// One call into the container encoder and what it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub stage: SearchStage,
    pub palette_size: u16,
    pub posterize_bits: Option<u8>,
    pub size_bytes: usize,
    pub within_budget: bool,
    pub elapsed_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EncodeTelemetry {
    pub generation: u64,
    pub attempts: Vec<AttemptRecord>,
    pub notes: Vec<String>,
}

impl EncodeTelemetry {
    pub fn smallest_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.iter().min_by_key(|attempt| attempt.size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(palette_size: u16, size_bytes: usize) -> AttemptRecord {
        AttemptRecord {
            stage: SearchStage::RemainingPalettes,
            palette_size,
            posterize_bits: None,
            size_bytes,
            within_budget: false,
            elapsed_ms: 0,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn smallest_attempt_picks_fewest_bytes() {
        let mut telemetry = EncodeTelemetry::default();
        assert!(telemetry.smallest_attempt().is_none());

        telemetry.attempts = vec![record(256, 900), record(32, 400), record(64, 650)];
        let smallest = telemetry.smallest_attempt().expect("attempts recorded");
        assert_eq!(smallest.palette_size, 32);
        assert_eq!(smallest.size_bytes, 400);
    }
}
