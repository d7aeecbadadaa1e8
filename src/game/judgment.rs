use crate::game::sequence::DifficultyTag;

// Rating thresholds over the absolute timing offset, in milliseconds. The
// outer boundary is inclusive: a 350ms offset still counts, 351ms does not.
pub const PERFECT_MS: f32 = 50.0;
pub const GREAT_MS: f32 = 100.0;
pub const GOOD_MS: f32 = 200.0;
pub const OK_MS: f32 = 350.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    Perfect,
    Great,
    Good,
    Ok,
}

/// Classify a signed timing offset (ms, negative = early) into a rating, or
/// `None` when it falls outside every hit threshold.
///
/// Boundaries land on the worse side: exactly 50ms is Great, exactly 350ms
/// is Ok.
#[inline(always)]
pub fn classify_offset_ms(offset_ms: f32) -> Option<Rating> {
    let abs = offset_ms.abs();
    if abs < PERFECT_MS {
        Some(Rating::Perfect)
    } else if abs < GREAT_MS {
        Some(Rating::Great)
    } else if abs < GOOD_MS {
        Some(Rating::Good)
    } else if abs <= OK_MS {
        Some(Rating::Ok)
    } else {
        None
    }
}

/// Minimum similarity a sample must reach for a target of this difficulty to
/// qualify. Fixed table, monotonically increasing with difficulty.
#[inline(always)]
pub fn minimum_accuracy(difficulty: DifficultyTag) -> f32 {
    match difficulty {
        DifficultyTag::Easy => 0.5,
        DifficultyTag::Normal => 0.6,
        DifficultyTag::Hard => 0.7,
        DifficultyTag::Expert => 0.8,
    }
}

/// The outcome of a successful match. Emitted exactly once per target and
/// immutable afterward; scoring and combo systems consume it downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitVerdict {
    pub target_id: u64,
    /// Signed offset from the target's nominal hit time (negative = early).
    pub offset_ms: f32,
    /// Similarity score of the matching sample, in [0, 1].
    pub accuracy: f32,
    pub rating: Rating,
    pub resolved_at_ms: f64,
}
