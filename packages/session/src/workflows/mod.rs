//! Tool workflows.
//!
//! Each workflow checks its preconditions before touching any state, calls
//! into the geometry engine, replaces the analysis result set, and returns
//! an outcome whose `Display` is the text shown to the user.

mod proximity;
mod road_corridor;
mod set_ops;

pub use proximity::{NearestHospital, ProximityOutcome};
pub use road_corridor::ImpactReport;
pub use set_ops::SetOpOutcome;

use crate::SessionError;

/// Parses a user-entered distance in kilometres. Text that is not a
/// number yields `NaN`, which every workflow rejects.
#[must_use]
pub fn parse_distance(text: &str) -> f64 {
    text.trim().parse().unwrap_or(f64::NAN)
}

/// Accepts finite, strictly positive distances.
fn require_distance(km: f64, message: &str) -> Result<f64, SessionError> {
    if km.is_finite() && km > 0.0 {
        Ok(km)
    } else {
        Err(SessionError::precondition(message))
    }
}
