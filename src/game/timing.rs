use crate::game::sequence::DifficultyTag;
use std::collections::VecDeque;

/// How many recent hit offsets feed the rolling profile.
pub const PROFILE_CAPACITY: usize = 20;

/// Consistency (population stddev, ms) that maps to a 1.0 window factor.
const NORMALIZING_STDDEV_MS: f32 = 60.0;
const CONSISTENCY_CLAMP_LO: f32 = 0.75;
const CONSISTENCY_CLAMP_HI: f32 = 1.5;

/// Fraction of the mean offset the window center compensates. Partial on
/// purpose: full cancellation oscillates as the player adapts back.
const OFFSET_DAMPING: f32 = 0.5;

/// Easier tags get wider windows. Easy is the identity so a fresh profile
/// reproduces the configured base window exactly.
#[inline(always)]
pub fn difficulty_multiplier(difficulty: DifficultyTag) -> f32 {
    match difficulty {
        DifficultyTag::Easy => 1.0,
        DifficultyTag::Normal => 0.85,
        DifficultyTag::Hard => 0.7,
        DifficultyTag::Expert => 0.55,
    }
}

/// Acceptance interval around a target's nominal hit time: a sample at
/// timestamp `t` is in range when |t - (nominal + center_offset)| <= half_width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceWindow {
    pub half_width_ms: f32,
    pub center_offset_ms: f32,
}

impl AcceptanceWindow {
    /// Latest instant at which a sample can still land in this window,
    /// relative to the nominal hit time. Past it the target is a miss.
    #[inline(always)]
    pub fn late_deadline_ms(&self) -> f32 {
        self.center_offset_ms + self.half_width_ms
    }
}

/// Rolling statistics over the player's recent verdict offsets. Mutated only
/// by `record_hit`, exactly once per resolved hit, never per miss; reset only
/// on level reload.
#[derive(Debug, Clone, Default)]
pub struct TimingProfile {
    offsets_ms: VecDeque<f32>,
    mean_ms: f32,
    stddev_ms: f32,
}

impl TimingProfile {
    pub fn new() -> Self {
        Self {
            offsets_ms: VecDeque::with_capacity(PROFILE_CAPACITY),
            mean_ms: 0.0,
            stddev_ms: 0.0,
        }
    }

    pub fn record_hit(&mut self, offset_ms: f32) {
        if self.offsets_ms.len() == PROFILE_CAPACITY {
            self.offsets_ms.pop_front();
        }
        self.offsets_ms.push_back(offset_ms);
        self.recompute();
    }

    fn recompute(&mut self) {
        let count = self.offsets_ms.len();
        if count == 0 {
            self.mean_ms = 0.0;
            self.stddev_ms = 0.0;
            return;
        }
        let sum: f32 = self.offsets_ms.iter().sum();
        self.mean_ms = sum / count as f32;

        // Population standard deviation over the rolling buffer.
        let sum_sq: f32 = self
            .offsets_ms
            .iter()
            .map(|o| {
                let d = o - self.mean_ms;
                d * d
            })
            .sum();
        self.stddev_ms = (sum_sq / count as f32).sqrt();
    }

    #[inline(always)]
    pub fn hit_count(&self) -> usize {
        self.offsets_ms.len()
    }

    /// Arithmetic mean of the recorded signed offsets (systematic bias).
    #[inline(always)]
    pub fn average_offset_ms(&self) -> f32 {
        self.mean_ms
    }

    /// Population stddev of the recorded offsets (erraticness). Neutral until
    /// at least two hits exist.
    #[inline(always)]
    pub fn consistency_ms(&self) -> Option<f32> {
        if self.offsets_ms.len() < 2 {
            None
        } else {
            Some(self.stddev_ms)
        }
    }

    /// Derive the acceptance window for a target of the given difficulty.
    ///
    /// Erratic players get wider windows, harder tags narrower ones; the
    /// center shifts against a systematic early/late bias without fully
    /// canceling it.
    pub fn window_for(
        &self,
        difficulty: DifficultyTag,
        base_window_ms: f32,
    ) -> AcceptanceWindow {
        let consistency_factor = match self.consistency_ms() {
            Some(stddev) => (stddev / NORMALIZING_STDDEV_MS)
                .clamp(CONSISTENCY_CLAMP_LO, CONSISTENCY_CLAMP_HI),
            None => 1.0,
        };
        let center_offset_ms = if self.offsets_ms.len() < 2 {
            0.0
        } else {
            -self.mean_ms * OFFSET_DAMPING
        };
        AcceptanceWindow {
            half_width_ms: base_window_ms * difficulty_multiplier(difficulty) * consistency_factor,
            center_offset_ms,
        }
    }
}
