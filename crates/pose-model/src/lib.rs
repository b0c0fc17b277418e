//! Stride Pose Model
//!
//! Defines the core data contracts for Stride assessments:
//! - **Landmarks:** Timestamped 33-point body pose frames from the detector
//! - **Geometry:** Normalized 2-D points, joint angles, and tilt
//! - **Items:** The clinical test catalogue (Berg Balance Scale, TUG, 10MWT)
//! - **Reports:** Score results, assessment reports, and BBS totals
//!
//! All coordinates are normalized to `[0.0, 1.0]` relative to the video
//! frame (`y` grows downward), so they survive resolution changes between
//! recordings.

pub mod geometry;
pub mod item;
pub mod landmark;
pub mod report;
pub mod synthetic;

pub use geometry::*;
pub use item::*;
pub use landmark::*;
pub use report::*;
