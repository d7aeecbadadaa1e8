pub mod config;
pub mod game;

pub use config::{ConfigError, LevelConfig};
pub use game::engine::{Engine, GameEvent, SampleTrace};
pub use game::judgment::{HitVerdict, Rating};
pub use game::pose::{Keypoint, PoseSample, PoseTemplate, TemplateJoint, TemplateSet};
pub use game::sequence::{DifficultyTag, SequenceEntry};
pub use game::stats::{OffsetSummary, RatingCounts};
pub use game::target::{Target, TargetState};
pub use game::timing::{AcceptanceWindow, TimingProfile};
