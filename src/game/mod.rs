pub mod engine;
pub mod judgment;
pub mod pose;
pub mod sequence;
pub mod stats;
pub mod target;
pub mod timing;
