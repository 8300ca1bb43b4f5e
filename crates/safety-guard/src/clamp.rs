use crate::{ClampedGoal, SafetyLimit};
use std::collections::BTreeMap;

/// Pull `goal` back so that it lies within `max_delta` of `present`.
///
/// A NaN goal holds the present position.
pub fn clamp_goal(goal: f64, present: f64, max_delta: f64) -> f64 {
    if goal.is_nan() {
        return present;
    }
    let delta = goal - present;
    if delta.abs() > max_delta {
        present + delta.signum() * max_delta
    } else {
        goal
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeGoals {
    pub goals: BTreeMap<String, f64>,
    pub clamped: Vec<ClampedGoal>,
}

/// Apply `limit` to every `(goal, present)` pair, keyed by joint name.
pub fn ensure_safe_goal_positions(
    goal_present: &BTreeMap<String, (f64, f64)>,
    limit: &SafetyLimit,
) -> SafeGoals {
    let mut out = SafeGoals::default();
    for (joint, &(goal, present)) in goal_present {
        let applied = match limit.max_delta(joint) {
            Some(max_delta) => clamp_goal(goal, present, max_delta),
            None => goal,
        };
        if applied != goal {
            out.clamped.push(ClampedGoal {
                joint: joint.clone(),
                requested: goal,
                present,
                applied,
            });
        }
        out.goals.insert(joint.clone(), applied);
    }
    if !out.clamped.is_empty() {
        let summary: Vec<String> = out
            .clamped
            .iter()
            .map(|c| format!("{}: {:.1} -> {:.1}", c.joint, c.requested, c.applied))
            .collect();
        tracing::warn!(
            "relative goal position magnitude had to be clamped to be safe: {}",
            summary.join(", ")
        );
    }
    out
}
