//! Clinical scoring rubrics.
//!
//! Every function here is total and pure: it takes the final measurement
//! bundle for one item and tests the rubric thresholds in descending
//! order, first match wins. Thresholds are inclusive.

use serde::{Deserialize, Serialize};
use stride_pose_model::report::ScoreResult;

/// Reach distance for full marks on the arm-reach item.
pub const ARM_REACH_FULL_CM: f64 = 25.0;
pub const ARM_REACH_GOOD_CM: f64 = 12.5;
pub const ARM_REACH_MIN_CM: f64 = 5.0;

/// Remaining gap to the floor that still counts as a near miss.
pub const FLOOR_NEAR_MISS_CM: f64 = 5.0;

pub const STANDING_TARGET_SECS: f64 = 120.0;
pub const STANDING_MIN_SECS: f64 = 30.0;

pub const LOOK_BEHIND_FULL_DEG: f64 = 45.0;
pub const LOOK_BEHIND_PARTIAL_DEG: f64 = 30.0;
pub const LOOK_BEHIND_MIN_DEG: f64 = 10.0;

pub const TURN_FAST_SECS: f64 = 4.0;

pub const STEP_TARGET_TOUCHES: u32 = 8;
pub const STEP_TARGET_SECS: f64 = 20.0;

pub const TANDEM_TARGET_SECS: f64 = 30.0;
pub const TANDEM_MIN_SECS: f64 = 15.0;

pub const SINGLE_LEG_FULL_SECS: f64 = 10.0;
pub const SINGLE_LEG_GOOD_SECS: f64 = 5.0;
pub const SINGLE_LEG_MIN_SECS: f64 = 3.0;

/// How much the hands were used to push up from the chair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandSupport {
    /// No hand contact with knees, thighs or armrests during the rise.
    None,
    /// Contact in under half of the rise frames.
    Partial,
    /// Contact in half or more of the rise frames.
    Full,
}

/// Foot placement levels for the tandem-stance item, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StanceType {
    Tandem,
    Forward,
    SmallStep,
}

impl StanceType {
    pub const ALL: [StanceType; 3] = [StanceType::Tandem, StanceType::Forward, StanceType::SmallStep];

    pub fn label(self) -> &'static str {
        match self {
            StanceType::Tandem => "tandem",
            StanceType::Forward => "foot ahead",
            StanceType::SmallStep => "small step",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SitToStandInput {
    pub stood: bool,
    pub hand_support: HandSupport,
    pub failed_attempts: u32,
    pub assisted: bool,
    pub lost_balance: bool,
}

pub fn score_sit_to_stand(input: &SitToStandInput) -> ScoreResult {
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance during the rise");
    }
    if input.assisted {
        return ScoreResult::new(1, "Needed assistance to stand");
    }
    if !input.stood {
        return ScoreResult::new(0, "Did not reach standing");
    }
    match input.hand_support {
        HandSupport::None => ScoreResult::new(4, "Stood up without using hands"),
        HandSupport::Partial => {
            ScoreResult::new(3, "Stood up independently with brief hand support")
        }
        HandSupport::Full => ScoreResult::new(
            2,
            format!(
                "Stood up using hands ({} failed attempt(s))",
                input.failed_attempts
            ),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandingInput {
    pub duration_secs: f64,
    pub support_used: bool,
    pub retries: u32,
    pub lost_balance: bool,
}

pub fn score_standing_unsupported(input: &StandingInput) -> ScoreResult {
    let d = input.duration_secs;
    if input.lost_balance {
        return ScoreResult::new(0, format!("Lost balance after {d:.1}s"));
    }
    if d >= STANDING_TARGET_SECS && !input.support_used {
        ScoreResult::new(4, format!("Stood {d:.1}s safely without support"))
    } else if d >= STANDING_TARGET_SECS {
        ScoreResult::new(3, format!("Stood {d:.1}s with support"))
    } else if d >= STANDING_MIN_SECS && input.retries == 0 {
        ScoreResult::new(2, format!("Stood {d:.1}s unsupported (≥30s)"))
    } else if d >= STANDING_MIN_SECS {
        ScoreResult::new(
            1,
            format!("Stood {d:.1}s after {} retries", input.retries),
        )
    } else {
        ScoreResult::new(0, format!("Stood only {d:.1}s (<30s)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmReachInput {
    pub max_reach_cm: f64,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

pub fn score_arm_reach(input: &ArmReachInput) -> ScoreResult {
    let r = input.max_reach_cm;
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while reaching");
    }
    if r >= ARM_REACH_FULL_CM && !input.feet_moved {
        ScoreResult::new(4, format!("Reached {r:.1}cm forward (≥25cm) with feet in place"))
    } else if r >= ARM_REACH_FULL_CM {
        ScoreResult::new(3, format!("Reached {r:.1}cm (≥25cm) but feet moved"))
    } else if r >= ARM_REACH_GOOD_CM {
        ScoreResult::new(3, format!("Reached {r:.1}cm (≥12.5cm)"))
    } else if r >= ARM_REACH_MIN_CM {
        ScoreResult::new(2, format!("Reached {r:.1}cm (≥5cm)"))
    } else if r > 0.0 {
        ScoreResult::new(1, format!("Reached only {r:.1}cm"))
    } else {
        ScoreResult::new(0, "No forward reach detected")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorPickupInput {
    pub reached_floor: bool,
    pub feet_moved: bool,
    /// Remaining wrist-to-floor gap at the closest point, beyond the reach tolerance.
    pub closest_gap_cm: Option<f64>,
    pub attempted: bool,
    pub lost_balance: bool,
}

pub fn score_floor_pickup(input: &FloorPickupInput) -> ScoreResult {
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while bending");
    }
    if input.reached_floor && !input.feet_moved {
        return ScoreResult::new(4, "Picked up the object with feet in place");
    }
    if input.reached_floor {
        return ScoreResult::new(3, "Picked up the object but feet moved");
    }
    match input.closest_gap_cm {
        Some(gap) if gap <= FLOOR_NEAR_MISS_CM => {
            ScoreResult::new(2, format!("Came within {gap:.1}cm of the object (≤5cm)"))
        }
        _ if input.attempted => ScoreResult::new(1, "Attempted but did not reach the object"),
        _ => ScoreResult::new(0, "No attempt to pick up the object"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookBehindInput {
    pub left_max_deg: f64,
    pub right_max_deg: f64,
    pub weight_shift: bool,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

pub fn score_look_behind(input: &LookBehindInput) -> ScoreResult {
    let (l, r) = (input.left_max_deg, input.right_max_deg);
    let best = l.max(r);
    let worst = l.min(r);
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while turning");
    }
    if worst >= LOOK_BEHIND_FULL_DEG && input.weight_shift && !input.feet_moved {
        ScoreResult::new(
            4,
            format!("Looked behind both sides (L {l:.0}°, R {r:.0}°) with weight shift"),
        )
    } else if best >= LOOK_BEHIND_FULL_DEG && worst >= LOOK_BEHIND_PARTIAL_DEG {
        ScoreResult::new(
            3,
            format!("Looked behind one side well (L {l:.0}°, R {r:.0}°)"),
        )
    } else if best >= LOOK_BEHIND_PARTIAL_DEG {
        ScoreResult::new(2, format!("Turned sideways only (max {best:.0}°)"))
    } else if best > LOOK_BEHIND_MIN_DEG {
        ScoreResult::new(1, format!("Minimal rotation (max {best:.0}°)"))
    } else {
        ScoreResult::new(0, "No trunk rotation detected")
    }
}

/// One direction of the 360° turn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub completed: bool,
    pub elapsed_secs: f64,
}

impl TurnOutcome {
    fn is_fast(&self) -> bool {
        self.completed && self.elapsed_secs <= TURN_FAST_SECS
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnInput {
    pub first: TurnOutcome,
    pub second: TurnOutcome,
    pub lost_balance: bool,
}

pub fn score_turn_360(input: &TurnInput) -> ScoreResult {
    let (a, b) = (input.first, input.second);
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while turning");
    }
    match (a.completed, b.completed) {
        (true, true) => {
            let times = format!("{:.1}s and {:.1}s", a.elapsed_secs, b.elapsed_secs);
            match (a.is_fast(), b.is_fast()) {
                (true, true) => ScoreResult::new(4, format!("Both turns in ≤4s ({times})")),
                (true, false) | (false, true) => {
                    ScoreResult::new(3, format!("One turn in ≤4s ({times})"))
                }
                (false, false) => ScoreResult::new(2, format!("Both turns completed slowly ({times})")),
            }
        }
        (true, false) | (false, true) => ScoreResult::new(1, "Completed only one turn"),
        (false, false) => ScoreResult::new(0, "No full turn completed"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlternatingStepInput {
    pub touches: u32,
    /// Time from the first step to the eighth touch, if reached.
    pub secs_to_target: Option<f64>,
    pub lost_balance: bool,
}

pub fn score_alternating_step(input: &AlternatingStepInput) -> ScoreResult {
    let n = input.touches;
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while stepping");
    }
    match input.secs_to_target {
        Some(secs) if n >= STEP_TARGET_TOUCHES && secs <= STEP_TARGET_SECS => {
            ScoreResult::new(4, format!("{n} touches in {secs:.1}s (≤20s)"))
        }
        _ if n >= STEP_TARGET_TOUCHES => ScoreResult::new(3, format!("{n} touches, over 20s")),
        _ if n >= 4 => ScoreResult::new(2, format!("{n} touches")),
        _ if n >= 2 => ScoreResult::new(1, format!("{n} touches")),
        _ => ScoreResult::new(0, format!("{n} touches (<2)")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TandemInput {
    pub best_stance_type: Option<StanceType>,
    pub max_duration_secs: f64,
    pub lost_balance: bool,
}

pub fn score_tandem_stance(input: &TandemInput) -> ScoreResult {
    let d = input.max_duration_secs;
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance while stepping or standing");
    }
    match input.best_stance_type {
        Some(stance) if d >= TANDEM_TARGET_SECS => {
            let score = match stance {
                StanceType::Tandem => 4,
                StanceType::Forward => 3,
                StanceType::SmallStep => 2,
            };
            ScoreResult::new(score, format!("Held {} stance {d:.1}s (≥30s)", stance.label()))
        }
        Some(_) if d >= TANDEM_MIN_SECS => ScoreResult::new(1, format!("Held a step {d:.1}s (≥15s)")),
        _ => ScoreResult::new(0, format!("Held only {d:.1}s")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleLegInput {
    pub max_duration_secs: f64,
    pub lost_balance: bool,
}

pub fn score_single_leg_stance(input: &SingleLegInput) -> ScoreResult {
    let d = input.max_duration_secs;
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance");
    }
    if d >= SINGLE_LEG_FULL_SECS {
        ScoreResult::new(4, format!("Stood on one leg {d:.1}s (≥10s)"))
    } else if d >= SINGLE_LEG_GOOD_SECS {
        ScoreResult::new(3, format!("Stood on one leg {d:.1}s (≥5s)"))
    } else if d >= SINGLE_LEG_MIN_SECS {
        ScoreResult::new(2, format!("Stood on one leg {d:.1}s (≥3s)"))
    } else if d > 0.0 {
        ScoreResult::new(1, format!("Lifted a leg for {d:.1}s"))
    } else {
        ScoreResult::new(0, "No leg lift detected")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericInput {
    pub accumulated_secs: f64,
    pub target_secs: f64,
    pub lost_balance: bool,
}

pub fn score_generic(input: &GenericInput) -> ScoreResult {
    let (d, target) = (input.accumulated_secs, input.target_secs);
    if input.lost_balance {
        return ScoreResult::new(0, "Lost balance");
    }
    let fraction = if target > 0.0 { d / target } else { 0.0 };
    if fraction >= 1.0 {
        ScoreResult::new(4, format!("Held {d:.1}s of {target:.0}s"))
    } else if fraction >= 0.5 {
        ScoreResult::new(2, format!("Held {d:.1}s of {target:.0}s (≥50%)"))
    } else if d > 0.0 {
        ScoreResult::new(1, format!("Held only {d:.1}s of {target:.0}s"))
    } else {
        ScoreResult::new(0, "Target posture not held")
    }
}
