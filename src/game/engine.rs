use crate::config::{ConfigError, LevelConfig};
use crate::game::judgment::{HitVerdict, classify_offset_ms, minimum_accuracy};
use crate::game::pose::{PoseSample, TemplateSet, similarity_score};
use crate::game::sequence::{SequenceCursor, generate_sequence};
use crate::game::stats::{OffsetSummary, RatingCounts, summarize_offsets};
use crate::game::target::{Target, TargetTracker};
use crate::game::timing::TimingProfile;
use log::{debug, info};
use std::collections::VecDeque;

/// Samples whose overall confidence sits below this floor are treated as
/// "no match", not as errors.
pub const MIN_SAMPLE_CONFIDENCE: f32 = 0.3;

/// Recent-sample history cap; oldest entries are evicted first.
pub const SAMPLE_HISTORY_CAP: usize = 32;

/// Notifications for scoring, combo, and visual systems, queued internally
/// and drained by the caller after each tick/resolve.
#[derive(Debug, Clone)]
pub enum GameEvent {
    TargetSpawned(Target),
    TargetMissed(Target),
    HitResolved(HitVerdict),
    LevelComplete,
}

/// Lightweight trace of one consumed pose sample; kept for stability
/// heuristics that look at recent estimator behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTrace {
    pub timestamp_ms: f64,
    pub overall_confidence: f32,
}

/// The timing and pose-matching engine for one level session.
///
/// Driven by two external call sites on a single logical timeline: a periodic
/// `tick(now)` from the scheduler and `resolve(sample)` whenever the pose
/// estimator delivers a reading. Callers must serialize the two; the engine
/// holds no locks and assumes at most one concurrent caller.
#[derive(Debug)]
pub struct Engine {
    tracker: TargetTracker,
    profile: TimingProfile,
    counts: RatingCounts,
    /// Every hit offset of the level, for end-of-level summaries. Bounded by
    /// the sequence length.
    hit_offsets_ms: Vec<f32>,
    sample_history: VecDeque<SampleTrace>,
    events: Vec<GameEvent>,
    speed_multiplier: f32,
    completion_announced: bool,
}

impl Engine {
    /// Validates the level configuration and primes the sequence. The engine
    /// never starts with invalid configuration: every configured pose name
    /// must have a loaded template.
    pub fn new(
        config: &LevelConfig,
        templates: TemplateSet,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        for name in &config.pose_names {
            if templates.get(name).is_none() {
                return Err(ConfigError::MissingTemplate(name.clone()));
            }
        }

        let sequence = generate_sequence(config, seed);
        info!(
            "Engine primed: {} targets scheduled, {} templates, seed {seed}",
            sequence.len(),
            templates.len()
        );
        let tracker = TargetTracker::new(
            SequenceCursor::new(sequence),
            templates,
            config.base_spawn_interval_ms,
            config.approach_duration_ms,
            config.base_window_ms,
        );

        Ok(Self {
            tracker,
            profile: TimingProfile::new(),
            counts: RatingCounts::default(),
            hit_offsets_ms: Vec::new(),
            sample_history: VecDeque::with_capacity(SAMPLE_HISTORY_CAP),
            events: Vec::new(),
            speed_multiplier: 1.0,
            completion_announced: false,
        })
    }

    /// Scheduler entry point: expire overdue targets, spawn due ones, retire
    /// stale resolved ones, and detect level completion. Total over any
    /// well-formed clock; `now_ms` should be monotonic.
    pub fn tick(&mut self, now_ms: f64) {
        let outcome = self.tracker.tick(now_ms, &self.profile, self.speed_multiplier);
        for target in outcome.missed {
            self.counts.record_miss();
            self.events.push(GameEvent::TargetMissed(target));
        }
        for target in outcome.spawned {
            self.events.push(GameEvent::TargetSpawned(target));
        }
        self.tracker.retire(now_ms);
        self.check_completion();
    }

    /// Estimator entry point: match one pose sample against the live targets.
    ///
    /// A sample resolves at most one target. Among targets whose acceptance
    /// window contains the sample and whose similarity floor is met, the
    /// earliest-due one wins (FIFO over overlapping windows, deliberately not
    /// best-accuracy-wins). A sample that matches nothing is discarded.
    pub fn resolve(&mut self, sample: &PoseSample) -> Option<HitVerdict> {
        // Malformed input yields no verdict; it is not an error.
        if sample.joint_count() == 0 || sample.overall_confidence() < MIN_SAMPLE_CONFIDENCE {
            debug!(
                "Discarding sample at {:.0}ms: {} joints, confidence {:.2}",
                sample.timestamp_ms(),
                sample.joint_count(),
                sample.overall_confidence()
            );
            return None;
        }

        if self.sample_history.len() == SAMPLE_HISTORY_CAP {
            self.sample_history.pop_front();
        }
        self.sample_history.push_back(SampleTrace {
            timestamp_ms: sample.timestamp_ms(),
            overall_confidence: sample.overall_confidence(),
        });

        // Targets are stored in spawn order and spawn times are monotonic, so
        // the first qualifying target is the earliest-due one.
        let mut verdict = None;
        for target in self.tracker.targets_mut() {
            if !target.is_unresolved() {
                continue;
            }
            let center = target.nominal_hit_ms + target.window.center_offset_ms as f64;
            if (sample.timestamp_ms() - center).abs() > target.window.half_width_ms as f64 {
                continue;
            }
            let accuracy = similarity_score(&target.template, sample);
            if accuracy < minimum_accuracy(target.difficulty) {
                continue;
            }
            let offset_ms = (sample.timestamp_ms() - target.nominal_hit_ms) as f32;
            let Some(rating) = classify_offset_ms(offset_ms) else {
                continue;
            };

            target.mark_hit(sample.timestamp_ms());
            verdict = Some(HitVerdict {
                target_id: target.id,
                offset_ms,
                accuracy,
                rating,
                resolved_at_ms: sample.timestamp_ms(),
            });
            break;
        }

        let verdict = verdict?;
        info!(
            "HIT: target {} rated {:?}, offset {:+.1}ms, accuracy {:.3}",
            verdict.target_id, verdict.rating, verdict.offset_ms, verdict.accuracy
        );
        self.profile.record_hit(verdict.offset_ms);
        self.counts.record_hit(verdict.rating);
        self.hit_offsets_ms.push(verdict.offset_ms);
        self.events.push(GameEvent::HitResolved(verdict));
        self.check_completion();
        Some(verdict)
    }

    fn check_completion(&mut self) {
        if !self.completion_announced && self.tracker.is_complete() {
            self.completion_announced = true;
            info!(
                "Level complete: {}/{} hits",
                self.counts.hits(),
                self.counts.total()
            );
            self.events.push(GameEvent::LevelComplete);
        }
    }

    /// External difficulty controller input. Ignored unless finite and
    /// positive; the engine never owns this value.
    pub fn set_speed_multiplier(&mut self, multiplier: f32) {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.speed_multiplier = multiplier;
        }
    }

    /// Queued notifications since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every tracked target: unresolved ones plus resolved ones still inside
    /// the retirement grace period.
    pub fn active_targets(&self) -> &[Target] {
        self.tracker.targets()
    }

    pub fn hit_statistics(&self) -> RatingCounts {
        self.counts
    }

    pub fn offset_summary(&self) -> OffsetSummary {
        summarize_offsets(&self.hit_offsets_ms)
    }

    pub fn is_level_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    pub fn timing_profile(&self) -> &TimingProfile {
        &self.profile
    }

    pub fn recent_samples(&self) -> impl ExactSizeIterator<Item = &SampleTrace> {
        self.sample_history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, GameEvent, SAMPLE_HISTORY_CAP};
    use crate::config::{ConfigError, LevelConfig};
    use crate::game::judgment::Rating;
    use crate::game::pose::{Keypoint, PoseSample, PoseTemplate, TemplateJoint, TemplateSet};
    use crate::game::target::TargetState;
    use rustc_hash::FxHashMap;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const ARMS_UP_JOINTS: [(&str, [f32; 3]); 4] = [
        ("left_wrist", [0.3, 0.9, 0.0]),
        ("right_wrist", [-0.3, 0.9, 0.0]),
        ("left_elbow", [0.25, 0.5, 0.0]),
        ("right_elbow", [-0.25, 0.5, 0.0]),
    ];

    const T_POSE_JOINTS: [(&str, [f32; 3]); 4] = [
        ("left_wrist", [0.8, 0.0, 0.0]),
        ("right_wrist", [-0.8, 0.0, 0.0]),
        ("left_elbow", [0.4, 0.0, 0.0]),
        ("right_elbow", [-0.4, 0.0, 0.0]),
    ];

    fn template(name: &str, joints: &[(&str, [f32; 3])]) -> PoseTemplate {
        let joints = joints
            .iter()
            .map(|(joint, [x, y, z])| {
                (
                    joint.to_string(),
                    TemplateJoint { x: *x, y: *y, z: *z, weight: 1.0 },
                )
            })
            .collect();
        PoseTemplate { name: name.to_string(), joints }
    }

    fn templates() -> TemplateSet {
        let mut set = TemplateSet::new();
        set.insert(template("arms_up", &ARMS_UP_JOINTS)).unwrap();
        set.insert(template("t_pose", &T_POSE_JOINTS)).unwrap();
        set
    }

    fn sample_matching(joints: &[(&str, [f32; 3])], timestamp_ms: f64) -> PoseSample {
        let joints: FxHashMap<String, Keypoint> = joints
            .iter()
            .map(|(joint, [x, y, z])| {
                (
                    joint.to_string(),
                    Keypoint { x: *x, y: *y, z: *z, confidence: 1.0 },
                )
            })
            .collect();
        PoseSample::new(joints, timestamp_ms)
    }

    fn level(sequence_length: usize, interval_ms: f32) -> LevelConfig {
        LevelConfig {
            pose_names: vec!["arms_up".to_string()],
            base_spawn_interval_ms: interval_ms,
            approach_duration_ms: 3000.0,
            base_window_ms: 200.0,
            sequence_length,
        }
    }

    #[test]
    fn canonical_scenario_resolves_a_perfect_hit() {
        init_logs();
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);

        let verdict = engine
            .resolve(&sample_matching(&ARMS_UP_JOINTS, 3040.0))
            .expect("matching sample inside the window must resolve");
        assert_eq!(verdict.offset_ms, 40.0);
        assert_eq!(verdict.rating, Rating::Perfect);
        assert!(verdict.accuracy > 0.99, "accuracy was {}", verdict.accuracy);

        let counts = engine.hit_statistics();
        assert_eq!(counts.perfect, 1);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn unanswered_target_is_missed_after_the_window_closes() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        engine.drain_events();

        engine.tick(3201.0);
        let events = engine.drain_events();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, GameEvent::TargetMissed(t) if t.state == TargetState::Missed)),
            "expected a miss event, got {events:?}"
        );
        assert_eq!(engine.hit_statistics().miss, 1);
        assert!(engine.is_level_complete());
    }

    #[test]
    fn sample_outside_the_window_is_discarded() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        assert!(engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 2700.0)).is_none());
        // The target is still live and can be hit afterwards.
        assert!(engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 2950.0)).is_some());
    }

    #[test]
    fn wrong_pose_does_not_qualify() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        assert!(
            engine.resolve(&sample_matching(&T_POSE_JOINTS, 3000.0)).is_none(),
            "a t_pose sample must not resolve an arms_up target"
        );
    }

    #[test]
    fn malformed_samples_yield_no_verdict() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);

        let empty = PoseSample::new(FxHashMap::default(), 3000.0);
        assert!(engine.resolve(&empty).is_none());

        let mut joints = FxHashMap::default();
        joints.insert(
            "left_wrist".to_string(),
            Keypoint { x: 0.3, y: 0.9, z: 0.0, confidence: 0.1 },
        );
        let faint = PoseSample::new(joints, 3000.0);
        assert!(engine.resolve(&faint).is_none(), "overall confidence below floor");
    }

    #[test]
    fn one_sample_never_resolves_two_targets() {
        // Two targets 100ms apart with 200ms windows: both contain t=3050.
        let mut engine = Engine::new(&level(2, 100.0), templates(), 0).unwrap();
        engine.tick(0.0);
        engine.tick(150.0);
        assert_eq!(engine.active_targets().len(), 2);

        let first = engine
            .resolve(&sample_matching(&ARMS_UP_JOINTS, 3050.0))
            .expect("sample qualifies for both targets");
        // FIFO: the earliest-due target wins, not the closer-in-time one.
        assert_eq!(first.target_id, 1);

        let second = engine
            .resolve(&sample_matching(&ARMS_UP_JOINTS, 3050.0))
            .expect("second target still live");
        assert_eq!(second.target_id, 2);
    }

    #[test]
    fn at_most_one_verdict_per_target() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        assert!(engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 3000.0)).is_some());
        assert!(
            engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 3001.0)).is_none(),
            "a resolved target must never match again"
        );

        let verdicts = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::HitResolved(_)))
            .count();
        assert_eq!(verdicts, 1);
    }

    #[test]
    fn duplicate_timestamps_are_tolerated() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        let s = sample_matching(&ARMS_UP_JOINTS, 2990.0);
        let first = engine.resolve(&s);
        let again = engine.resolve(&s);
        assert!(first.is_some());
        assert!(again.is_none());
    }

    #[test]
    fn completion_event_fires_exactly_once() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 3000.0));
        engine.tick(3300.0);
        engine.tick(3400.0);
        let completions = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::LevelComplete))
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn empty_sequence_completes_on_the_first_tick() {
        let mut engine = Engine::new(&level(0, 1000.0), templates(), 0).unwrap();
        assert!(engine.is_level_complete());
        engine.tick(0.0);
        assert!(
            engine
                .drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::LevelComplete))
        );
    }

    #[test]
    fn missing_template_is_rejected_at_construction() {
        let config = LevelConfig {
            pose_names: vec!["arms_up".to_string(), "unknown_pose".to_string()],
            base_spawn_interval_ms: 1000.0,
            approach_duration_ms: 3000.0,
            base_window_ms: 200.0,
            sequence_length: 30,
        };
        match Engine::new(&config, templates(), 0) {
            Err(ConfigError::MissingTemplate(name)) => assert_eq!(name, "unknown_pose"),
            other => panic!("expected MissingTemplate, got {other:?}"),
        }
    }

    #[test]
    fn verdict_stream_is_deterministic_across_runs() {
        let run = || {
            let mut engine = Engine::new(&level(3, 500.0), templates(), 42).unwrap();
            let mut verdicts = Vec::new();
            for step in 0..12 {
                let now = step as f64 * 400.0;
                engine.tick(now);
                if let Some(v) =
                    engine.resolve(&sample_matching(&ARMS_UP_JOINTS, now + 35.0))
                {
                    verdicts.push(v);
                }
            }
            verdicts
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn adaptive_center_shifts_against_a_late_bias() {
        // Nine consistently late hits, then observe the next spawn's window.
        let mut engine = Engine::new(&level(10, 4000.0), templates(), 0).unwrap();
        for i in 0..9 {
            let spawn = i as f64 * 4000.0;
            engine.tick(spawn);
            let v = engine.resolve(&sample_matching(&ARMS_UP_JOINTS, spawn + 3000.0 + 80.0));
            assert!(v.is_some(), "late hit {i} should land inside the window");
        }
        engine.tick(9.0 * 4000.0);
        let last = engine
            .active_targets()
            .iter()
            .find(|t| t.sequence_index == 9)
            .expect("tenth target spawned");
        // Damped compensation: a stable +80ms mean pulls the center to -40ms.
        assert!(
            last.window.center_offset_ms < -35.0,
            "center should shift early against a +80ms bias, got {:+.1}ms",
            last.window.center_offset_ms
        );
    }

    #[test]
    fn sample_history_is_bounded_with_oldest_eviction() {
        let mut engine = Engine::new(&level(1, 1000.0), templates(), 0).unwrap();
        engine.tick(0.0);
        for i in 0..(SAMPLE_HISTORY_CAP + 10) {
            engine.resolve(&sample_matching(&ARMS_UP_JOINTS, 100.0 + i as f64));
        }
        assert_eq!(engine.recent_samples().len(), SAMPLE_HISTORY_CAP);
        let oldest = engine.recent_samples().next().unwrap().timestamp_ms;
        assert_eq!(oldest, 110.0, "the first ten samples should have been evicted");
    }

    #[test]
    fn speed_multiplier_guard_matches_rate_semantics() {
        let mut engine = Engine::new(&level(5, 1000.0), templates(), 0).unwrap();
        engine.set_speed_multiplier(0.0);
        engine.set_speed_multiplier(f32::NAN);
        engine.set_speed_multiplier(2.0);
        engine.tick(0.0);
        engine.drain_events();
        engine.tick(500.0);
        let spawned = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::TargetSpawned(_)))
            .count();
        assert_eq!(spawned, 1, "2x speed halves the 1000ms interval");
    }
}
