use crate::game::pose::{PoseTemplate, TemplateSet};
use crate::game::sequence::{DifficultyTag, SequenceCursor};
use crate::game::timing::{AcceptanceWindow, TimingProfile};
use log::debug;
use smallvec::SmallVec;
use std::sync::Arc;

/// Upper bound on simultaneously unresolved targets; spawning stalls (not
/// drops) when reached.
pub const MAX_CONCURRENT_TARGETS: usize = 8;

/// Resolved targets linger this long before retirement so consumers can still
/// query them for feedback animations.
pub const RETIRE_GRACE_MS: f64 = 1000.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetState {
    Unresolved,
    Hit,
    Missed,
}

/// A scheduled opportunity to match a specific pose within a time window.
/// Owned by the tracker from spawn until retirement; transitions are
/// one-directional (Unresolved -> Hit, Unresolved -> Missed).
#[derive(Debug, Clone)]
pub struct Target {
    pub id: u64,
    pub template: Arc<PoseTemplate>,
    pub sequence_index: usize,
    pub difficulty: DifficultyTag,
    pub spawn_ms: f64,
    /// spawn + approach duration: when the pose is due.
    pub nominal_hit_ms: f64,
    /// Acceptance window assigned from the adaptive profile at spawn time.
    pub window: AcceptanceWindow,
    pub state: TargetState,
    /// Set once, at the Hit/Missed transition.
    pub resolved_at_ms: Option<f64>,
}

impl Target {
    #[inline(always)]
    pub fn is_unresolved(&self) -> bool {
        self.state == TargetState::Unresolved
    }

    /// Latest timestamp at which this target can still be hit.
    #[inline(always)]
    pub fn expiry_ms(&self) -> f64 {
        self.nominal_hit_ms + self.window.late_deadline_ms() as f64
    }

    pub(crate) fn mark_hit(&mut self, now_ms: f64) {
        debug_assert!(self.is_unresolved(), "target {} resolved twice", self.id);
        self.state = TargetState::Hit;
        self.resolved_at_ms = Some(now_ms);
    }

    pub(crate) fn mark_missed(&mut self, now_ms: f64) {
        debug_assert!(self.is_unresolved(), "target {} resolved twice", self.id);
        self.state = TargetState::Missed;
        self.resolved_at_ms = Some(now_ms);
    }
}

/// What a lifecycle pass produced; the engine turns these into events.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub spawned: Vec<Target>,
    pub missed: Vec<Target>,
}

/// Owns the in-flight target set and the spawn schedule. Spawns due sequence
/// entries in strict order, expires overdue targets, and retires resolved
/// ones after a grace period.
#[derive(Debug)]
pub struct TargetTracker {
    targets: SmallVec<[Target; MAX_CONCURRENT_TARGETS]>,
    cursor: SequenceCursor,
    templates: TemplateSet,
    next_id: u64,
    /// Anchored to the first tick's clock; None until the level starts.
    next_spawn_ms: Option<f64>,
    base_spawn_interval_ms: f32,
    approach_duration_ms: f32,
    base_window_ms: f32,
}

impl TargetTracker {
    pub fn new(
        cursor: SequenceCursor,
        templates: TemplateSet,
        base_spawn_interval_ms: f32,
        approach_duration_ms: f32,
        base_window_ms: f32,
    ) -> Self {
        Self {
            targets: SmallVec::new(),
            cursor,
            templates,
            next_id: 1,
            next_spawn_ms: None,
            base_spawn_interval_ms,
            approach_duration_ms,
            base_window_ms,
        }
    }

    #[inline(always)]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    #[inline(always)]
    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    fn unresolved_count(&self) -> usize {
        self.targets.iter().filter(|t| t.is_unresolved()).count()
    }

    /// Sequence exhausted and nothing left in flight.
    pub fn is_complete(&self) -> bool {
        self.cursor.is_exhausted() && self.targets.iter().all(|t| !t.is_unresolved())
    }

    /// One lifecycle pass: expire overdue targets, then spawn due sequence
    /// entries. `speed_multiplier` comes from the external difficulty
    /// controller and shortens the spawn interval when above 1.
    pub fn tick(
        &mut self,
        now_ms: f64,
        profile: &TimingProfile,
        speed_multiplier: f32,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for target in &mut self.targets {
            if target.is_unresolved() && now_ms > target.expiry_ms() {
                target.mark_missed(now_ms);
                debug!(
                    "Target {} (seq {}, {:?}) missed: due {:.0}ms, now {:.0}ms",
                    target.id, target.sequence_index, target.difficulty,
                    target.nominal_hit_ms, now_ms
                );
                outcome.missed.push(target.clone());
            }
        }

        let mut next_spawn = *self.next_spawn_ms.get_or_insert(now_ms);
        let interval = (self.base_spawn_interval_ms / speed_multiplier) as f64;

        // Catch up on every due entry, in sequence order, capacity permitting.
        while next_spawn <= now_ms && self.unresolved_count() < MAX_CONCURRENT_TARGETS {
            let Some(entry) = self.cursor.peek() else {
                break;
            };
            // Validated at engine construction; unknown names cannot reach here.
            let Some(template) = self.templates.get(&entry.pose_name).map(Arc::clone) else {
                debug_assert!(false, "unvalidated pose name {}", entry.pose_name);
                break;
            };
            let entry = self.cursor.advance().expect("peeked entry vanished");

            // The scheduled time, not the tick's clock, anchors the target so
            // late ticks do not skew the nominal hit time.
            let spawn_ms = next_spawn;
            let target = Target {
                id: self.next_id,
                template,
                sequence_index: entry.index,
                difficulty: entry.difficulty,
                spawn_ms,
                nominal_hit_ms: spawn_ms + self.approach_duration_ms as f64,
                window: profile.window_for(entry.difficulty, self.base_window_ms),
                state: TargetState::Unresolved,
                resolved_at_ms: None,
            };
            self.next_id += 1;
            next_spawn += interval;
            debug!(
                "Spawned target {} (seq {}, {:?}, pose \"{}\"): hit due {:.0}ms, window ±{:.0}ms{:+.0}ms",
                target.id, target.sequence_index, target.difficulty, target.template.name,
                target.nominal_hit_ms, target.window.half_width_ms, target.window.center_offset_ms
            );
            outcome.spawned.push(target.clone());
            self.targets.push(target);
        }
        self.next_spawn_ms = Some(next_spawn);

        outcome
    }

    /// Drops resolved targets older than the grace period to bound memory.
    pub fn retire(&mut self, now_ms: f64) {
        self.targets.retain(|t| match t.resolved_at_ms {
            Some(resolved_at) => now_ms - resolved_at <= RETIRE_GRACE_MS,
            None => true,
        });
    }
}
