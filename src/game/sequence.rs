use crate::config::LevelConfig;
use log::info;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// First ten entries repeat the introductory pose; the next band mixes in the
/// second pose before the full set opens up.
const INTRO_END: usize = 10;
const WARMUP_END: usize = 25;

/// Difficulty bands by ordinal index, independent of the level's base
/// difficulty (which scales timing constants globally instead).
const NORMAL_START: usize = 10;
const HARD_START: usize = 25;
const EXPERT_START: usize = 40;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DifficultyTag {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl DifficultyTag {
    /// Derived purely from sequence position via fixed bands.
    #[inline(always)]
    pub fn for_index(index: usize) -> Self {
        if index < NORMAL_START {
            Self::Easy
        } else if index < HARD_START {
            Self::Normal
        } else if index < EXPERT_START {
            Self::Hard
        } else {
            Self::Expert
        }
    }
}

/// One slot of the level's scripted plan, generated once and consumed in
/// order by the target tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    pub pose_name: String,
    pub difficulty: DifficultyTag,
    pub index: usize,
}

/// Deterministic ramp over the configured pose names: intro entries use only
/// the first pose, warmup entries draw from the first two, the rest draw
/// uniformly from the full set. Identical seeds yield identical sequences.
pub fn generate_sequence(config: &LevelConfig, seed: u64) -> Vec<SequenceEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pool = &config.pose_names;
    let mut entries = Vec::with_capacity(config.sequence_length);

    for index in 0..config.sequence_length {
        let available = if index < INTRO_END {
            1
        } else if index < WARMUP_END {
            pool.len().min(2)
        } else {
            pool.len()
        };
        let choice = if available <= 1 {
            0
        } else {
            rng.random_range(0..available)
        };
        entries.push(SequenceEntry {
            pose_name: pool[choice].clone(),
            difficulty: DifficultyTag::for_index(index),
            index,
        });
    }

    info!(
        "Generated sequence: {} entries over {} poses (seed {seed})",
        entries.len(),
        pool.len()
    );
    entries
}

/// Consumes a generated sequence in order. Exhaustion is the normal end
/// state, not an error.
#[derive(Debug, Clone)]
pub struct SequenceCursor {
    entries: Vec<SequenceEntry>,
    next: usize,
}

impl SequenceCursor {
    pub fn new(entries: Vec<SequenceEntry>) -> Self {
        Self { entries, next: 0 }
    }

    /// The entry the next spawn will consume, if any remain.
    pub fn peek(&self) -> Option<&SequenceEntry> {
        self.entries.get(self.next)
    }

    pub fn advance(&mut self) -> Option<SequenceEntry> {
        let entry = self.entries.get(self.next).cloned();
        if entry.is_some() {
            self.next += 1;
        }
        entry
    }

    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.entries.len()
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.next
    }
}
