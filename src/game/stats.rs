use crate::game::judgment::Rating;

/// Per-rating tallies for the running level, plus misses. Consumers poll this
/// for score and combo displays.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RatingCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub ok: u32,
    pub miss: u32,
}

impl RatingCounts {
    pub fn record_hit(&mut self, rating: Rating) {
        match rating {
            Rating::Perfect => self.perfect = self.perfect.saturating_add(1),
            Rating::Great => self.great = self.great.saturating_add(1),
            Rating::Good => self.good = self.good.saturating_add(1),
            Rating::Ok => self.ok = self.ok.saturating_add(1),
        }
    }

    pub fn record_miss(&mut self) {
        self.miss = self.miss.saturating_add(1);
    }

    #[inline(always)]
    pub fn hits(&self) -> u32 {
        self.perfect + self.great + self.good + self.ok
    }

    #[inline(always)]
    pub fn total(&self) -> u32 {
        self.hits() + self.miss
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OffsetSummary {
    pub mean_ms: f32,
    pub mean_abs_ms: f32,
    pub stddev_ms: f32,
    pub max_abs_ms: f32,
    pub count: usize,
}

/// Summary statistics over a level's recorded hit offsets. Misses carry no
/// offset and are excluded by construction.
pub fn summarize_offsets(offsets_ms: &[f32]) -> OffsetSummary {
    let count = offsets_ms.len();
    if count == 0 {
        return OffsetSummary::default();
    }

    let mut sum_signed = 0.0_f32;
    let mut sum_abs = 0.0_f32;
    let mut max_abs = 0.0_f32;
    for &offset in offsets_ms {
        let abs = offset.abs();
        sum_signed += offset;
        sum_abs += abs;
        if abs > max_abs {
            max_abs = abs;
        }
    }

    let mean_ms = sum_signed / count as f32;
    let mean_abs_ms = sum_abs / count as f32;

    // Sample standard deviation of the signed offsets.
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f32 = offsets_ms
            .iter()
            .map(|o| {
                let d = o - mean_ms;
                d * d
            })
            .sum();
        (sum_diff_sq / (count as f32 - 1.0)).sqrt()
    } else {
        0.0
    };

    OffsetSummary { mean_ms, mean_abs_ms, stddev_ms, max_abs_ms: max_abs, count }
}
