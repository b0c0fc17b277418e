//! One analyzer per BBS item, plus the duration-only fallback.

pub mod alternating_step;
pub mod arm_reach;
pub mod floor_pickup;
pub mod generic;
pub mod look_behind;
pub mod single_leg_stance;
pub mod sit_to_stand;
pub mod standing_unsupported;
pub mod tandem_stance;
pub mod turn_360;

pub use alternating_step::{AlternatingStepAnalyzer, AlternatingStepConfig};
pub use arm_reach::{ArmReachAnalyzer, ArmReachConfig, ReachView};
pub use floor_pickup::{FloorPickupAnalyzer, FloorPickupConfig};
pub use generic::{GenericAnalyzer, GenericConfig};
pub use look_behind::{LookBehindAnalyzer, LookBehindConfig, LookDirection};
pub use single_leg_stance::{SingleLegAnalyzer, SingleLegConfig};
pub use sit_to_stand::{SitToStandAnalyzer, SitToStandConfig};
pub use standing_unsupported::{StandingConfig, StandingUnsupportedAnalyzer};
pub use tandem_stance::{TandemConfig, TandemStanceAnalyzer};
pub use turn_360::{Turn360Analyzer, TurnConfig};
