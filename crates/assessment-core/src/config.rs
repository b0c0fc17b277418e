//! Clinical tuning for every analyzer, in one serializable bundle.
//!
//! Every field defaults, so a tuning file only needs the values it changes:
//!
//! ```json
//! { "arm_reach": { "view": "side" }, "single_leg": { "drop_grace_ms": 400 } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stride_common::error::{StrideError, StrideResult};

use crate::items::{
    AlternatingStepConfig, ArmReachConfig, FloorPickupConfig, GenericConfig, LookBehindConfig,
    SingleLegConfig, SitToStandConfig, StandingConfig, TandemConfig, TurnConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerTuning {
    pub sit_to_stand: SitToStandConfig,
    pub standing: StandingConfig,
    pub arm_reach: ArmReachConfig,
    pub floor_pickup: FloorPickupConfig,
    pub look_behind: LookBehindConfig,
    pub turn: TurnConfig,
    pub alternating_step: AlternatingStepConfig,
    pub tandem: TandemConfig,
    pub single_leg: SingleLegConfig,
    pub generic: GenericConfig,
}

impl AnalyzerTuning {
    /// Parse a (possibly partial) tuning document over the defaults.
    pub fn from_json(json: &str) -> StrideResult<Self> {
        Self::default().overlay_json(json)
    }

    /// Apply a (possibly partial) tuning document on top of these values.
    pub fn overlay_json(&self, json: &str) -> StrideResult<Self> {
        let patch: Value = serde_json::from_str(json)
            .map_err(|e| StrideError::config(format!("invalid analyzer tuning: {e}")))?;
        let mut merged = serde_json::to_value(self)?;
        merge(&mut merged, patch);
        serde_json::from_value(merged)
            .map_err(|e| StrideError::config(format!("invalid analyzer tuning: {e}")))
    }

    /// Use one landmark visibility cutoff for every analyzer.
    pub fn with_min_visibility(mut self, min_visibility: f64) -> Self {
        self.sit_to_stand.min_visibility = min_visibility;
        self.sit_to_stand.weighted.min_visibility = min_visibility;
        self.standing.min_visibility = min_visibility;
        self.arm_reach.min_visibility = min_visibility;
        self.floor_pickup.min_visibility = min_visibility;
        self.look_behind.min_visibility = min_visibility;
        self.turn.min_visibility = min_visibility;
        self.alternating_step.min_visibility = min_visibility;
        self.tandem.min_visibility = min_visibility;
        self.single_leg.min_visibility = min_visibility;
        self.generic.min_visibility = min_visibility;
        self
    }

    pub fn to_json(&self) -> StrideResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Recursively copy `patch` into `base`; objects merge, anything else replaces.
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ReachView;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let tuning = AnalyzerTuning::from_json(
            r#"{ "arm_reach": { "view": "side" }, "single_leg": { "drop_grace_ms": 400 } }"#,
        )
        .unwrap();
        assert_eq!(tuning.arm_reach.view, ReachView::Side);
        assert_eq!(tuning.arm_reach.return_window, 10);
        assert_eq!(tuning.single_leg.drop_grace_ms, 400);
        assert_eq!(tuning.tandem, TandemConfig::default());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(AnalyzerTuning::from_json("{}").unwrap(), AnalyzerTuning::default());
    }

    #[test]
    fn test_bad_document_is_config_error() {
        let err = AnalyzerTuning::from_json(r#"{ "turn": { "pause_ms": "soon" } }"#).unwrap_err();
        assert!(matches!(err, StrideError::Config { .. }));
    }

    #[test]
    fn test_visibility_cutoff_reaches_every_analyzer() {
        let tuning = AnalyzerTuning::default().with_min_visibility(0.7);
        assert_eq!(tuning.sit_to_stand.weighted.min_visibility, 0.7);
        assert_eq!(tuning.turn.min_visibility, 0.7);
        assert_eq!(tuning.generic.min_visibility, 0.7);
    }

    #[test]
    fn test_overlay_keeps_base_values_it_does_not_name() {
        let base = AnalyzerTuning::default().with_min_visibility(0.7);
        let tuning = base
            .overlay_json(r#"{ "turn": { "min_visibility": 0.3, "pause_ms": 2000 } }"#)
            .unwrap();
        assert_eq!(tuning.turn.min_visibility, 0.3);
        assert_eq!(tuning.turn.pause_ms, 2000);
        assert_eq!(tuning.tandem.min_visibility, 0.7);
    }

    #[test]
    fn test_serialized_defaults_parse_back() {
        let json = AnalyzerTuning::default().to_json().unwrap();
        assert_eq!(AnalyzerTuning::from_json(&json).unwrap(), AnalyzerTuning::default());
    }
}
