//! Club recruitment engine: cycle lifecycle, evaluator ranking, and the
//! capacity-bound allocation pass that turns ranked, accepted applications into
//! at most one club seat per applicant.

pub mod config;
pub mod error;
pub mod recruitment;
pub mod snapshot;
pub mod telemetry;
