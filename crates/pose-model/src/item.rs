//! The clinical test catalogue.
//!
//! Covers the 14 Berg Balance Scale items plus the two timed mobility
//! tests. Each item knows how it is analyzed and, for endurance items,
//! how long the patient is asked to hold the position.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single standardized test item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestItem {
    /// BBS 1: sitting to standing.
    SitToStand,
    /// BBS 2: standing unsupported for two minutes.
    StandingUnsupported,
    /// BBS 3: sitting with back unsupported for two minutes.
    SittingUnsupported,
    /// BBS 4: standing to sitting.
    StandToSit,
    /// BBS 5: transfers between chairs.
    Transfers,
    /// BBS 6: standing unsupported with eyes closed.
    StandingEyesClosed,
    /// BBS 7: standing unsupported with feet together.
    StandingFeetTogether,
    /// BBS 8: reaching forward with outstretched arm.
    ArmReach,
    /// BBS 9: picking up an object from the floor.
    FloorPickUp,
    /// BBS 10: turning to look behind over both shoulders.
    LookBehind,
    /// BBS 11: turning 360 degrees.
    Turn360,
    /// BBS 12: placing alternate foot on a stool.
    AlternatingStep,
    /// BBS 13: standing with one foot in front.
    TandemStance,
    /// BBS 14: standing on one leg.
    SingleLegStance,
    /// Timed Up and Go.
    TimedUpAndGo,
    /// Ten-meter walk test.
    TenMeterWalk,
}

/// How an item is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// A dedicated state-machine analyzer.
    Dedicated,
    /// The shared duration-only fallback.
    Generic,
    /// Scored from an externally timed duration.
    Timed,
}

/// Posture an item asks the patient to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPosture {
    Sitting,
    Standing,
}

impl TestItem {
    /// Every item, in protocol order.
    pub const ALL: [TestItem; 16] = [
        TestItem::SitToStand,
        TestItem::StandingUnsupported,
        TestItem::SittingUnsupported,
        TestItem::StandToSit,
        TestItem::Transfers,
        TestItem::StandingEyesClosed,
        TestItem::StandingFeetTogether,
        TestItem::ArmReach,
        TestItem::FloorPickUp,
        TestItem::LookBehind,
        TestItem::Turn360,
        TestItem::AlternatingStep,
        TestItem::TandemStance,
        TestItem::SingleLegStance,
        TestItem::TimedUpAndGo,
        TestItem::TenMeterWalk,
    ];

    /// Berg Balance Scale item number (1–14), `None` for timed tests.
    pub fn bbs_number(self) -> Option<u8> {
        match self {
            TestItem::SitToStand => Some(1),
            TestItem::StandingUnsupported => Some(2),
            TestItem::SittingUnsupported => Some(3),
            TestItem::StandToSit => Some(4),
            TestItem::Transfers => Some(5),
            TestItem::StandingEyesClosed => Some(6),
            TestItem::StandingFeetTogether => Some(7),
            TestItem::ArmReach => Some(8),
            TestItem::FloorPickUp => Some(9),
            TestItem::LookBehind => Some(10),
            TestItem::Turn360 => Some(11),
            TestItem::AlternatingStep => Some(12),
            TestItem::TandemStance => Some(13),
            TestItem::SingleLegStance => Some(14),
            TestItem::TimedUpAndGo | TestItem::TenMeterWalk => None,
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            TestItem::SitToStand => "Sitting to standing",
            TestItem::StandingUnsupported => "Standing unsupported",
            TestItem::SittingUnsupported => "Sitting with back unsupported",
            TestItem::StandToSit => "Standing to sitting",
            TestItem::Transfers => "Transfers",
            TestItem::StandingEyesClosed => "Standing with eyes closed",
            TestItem::StandingFeetTogether => "Standing with feet together",
            TestItem::ArmReach => "Reaching forward with outstretched arm",
            TestItem::FloorPickUp => "Pick up object from the floor",
            TestItem::LookBehind => "Turning to look behind",
            TestItem::Turn360 => "Turn 360 degrees",
            TestItem::AlternatingStep => "Placing alternate foot on stool",
            TestItem::TandemStance => "Standing with one foot in front",
            TestItem::SingleLegStance => "Standing on one leg",
            TestItem::TimedUpAndGo => "Timed Up and Go",
            TestItem::TenMeterWalk => "10-meter walk",
        }
    }

    /// Kebab-case identifier used on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            TestItem::SitToStand => "sit-to-stand",
            TestItem::StandingUnsupported => "standing-unsupported",
            TestItem::SittingUnsupported => "sitting-unsupported",
            TestItem::StandToSit => "stand-to-sit",
            TestItem::Transfers => "transfers",
            TestItem::StandingEyesClosed => "standing-eyes-closed",
            TestItem::StandingFeetTogether => "standing-feet-together",
            TestItem::ArmReach => "arm-reach",
            TestItem::FloorPickUp => "floor-pick-up",
            TestItem::LookBehind => "look-behind",
            TestItem::Turn360 => "turn-360",
            TestItem::AlternatingStep => "alternating-step",
            TestItem::TandemStance => "tandem-stance",
            TestItem::SingleLegStance => "single-leg-stance",
            TestItem::TimedUpAndGo => "timed-up-and-go",
            TestItem::TenMeterWalk => "ten-meter-walk",
        }
    }

    /// How this item is analyzed.
    pub fn analyzer_kind(self) -> AnalyzerKind {
        match self {
            TestItem::SittingUnsupported
            | TestItem::StandToSit
            | TestItem::Transfers
            | TestItem::StandingEyesClosed
            | TestItem::StandingFeetTogether => AnalyzerKind::Generic,
            TestItem::TimedUpAndGo | TestItem::TenMeterWalk => AnalyzerKind::Timed,
            _ => AnalyzerKind::Dedicated,
        }
    }

    /// The hold duration the patient is asked to achieve, if any.
    pub fn prescribed_duration_secs(self) -> Option<f64> {
        match self {
            TestItem::StandingUnsupported | TestItem::SittingUnsupported => Some(120.0),
            TestItem::StandToSit | TestItem::Transfers => Some(2.0),
            TestItem::StandingEyesClosed => Some(10.0),
            TestItem::StandingFeetTogether => Some(60.0),
            TestItem::TandemStance => Some(30.0),
            TestItem::SingleLegStance => Some(10.0),
            TestItem::AlternatingStep => Some(20.0),
            _ => None,
        }
    }

    /// The posture a duration-only item must hold.
    pub fn target_posture(self) -> Option<TargetPosture> {
        match self {
            TestItem::SittingUnsupported | TestItem::StandToSit | TestItem::Transfers => {
                Some(TargetPosture::Sitting)
            }
            TestItem::StandingUnsupported
            | TestItem::StandingEyesClosed
            | TestItem::StandingFeetTogether
            | TestItem::TandemStance
            | TestItem::SingleLegStance => Some(TargetPosture::Standing),
            _ => None,
        }
    }
}

impl fmt::Display for TestItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Error returned when parsing an unknown item identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown test item: {0}")]
pub struct UnknownItem(pub String);

impl FromStr for TestItem {
    type Err = UnknownItem;

    /// Accepts the slug, the snake_case name, or the BBS number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        if let Ok(number) = wanted.parse::<u8>() {
            return TestItem::ALL
                .into_iter()
                .find(|item| item.bbs_number() == Some(number))
                .ok_or_else(|| UnknownItem(s.to_string()));
        }
        TestItem::ALL
            .into_iter()
            .find(|item| item.slug() == wanted)
            .ok_or_else(|| UnknownItem(s.to_string()))
    }
}
