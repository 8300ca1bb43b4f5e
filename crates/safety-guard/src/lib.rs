//! safety-guard: rate limiting for commanded joint goals
//!
//! Bounds how far a commanded position may move away from the last known position in
//! one step. The bound runs before any hard range clamp, so the effective limit on a
//! joint is the tighter of the two.

mod error;
pub use error::SafetyError;

mod types;
pub use types::{ClampedGoal, SafetyLimit};

mod clamp;
pub use clamp::{clamp_goal, ensure_safe_goal_positions, SafeGoals};
