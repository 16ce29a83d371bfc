//! Per-session load estimation and coaching advice.
//!
//! Scores one completed session from its distance and elevation gain using a
//! per-sport-kind formula, then buckets the score into one of three fixed
//! advice tiers. Duration and heart rate never enter the score; they only
//! appear in the surrounding report text.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{Session, SportKind};

/// Advice tiers keyed off the session load score.
///
/// Exactly three tiers with fixed wording; no interpolation between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdviceTier {
    High,     // 250 and above
    Moderate, // 120 to 250
    Light,    // below 120
}

impl AdviceTier {
    /// Get advice tier from a load score
    pub fn from_load(load: Decimal) -> Self {
        if load >= dec!(250) {
            AdviceTier::High
        } else if load >= dec!(120) {
            AdviceTier::Moderate
        } else {
            AdviceTier::Light
        }
    }

    /// Get tier description
    pub fn description(&self) -> &'static str {
        match self {
            AdviceTier::High => "High load",
            AdviceTier::Moderate => "Moderate load",
            AdviceTier::Light => "Light load",
        }
    }

    /// Get the coaching advice line for this tier
    pub fn recommendation(&self) -> &'static str {
        match self {
            AdviceTier::High => {
                "High session load. Prioritize recovery: sleep, protein, and an easy day tomorrow."
            }
            AdviceTier::Moderate => "Moderate session load. Keep tomorrow light to moderate.",
            AdviceTier::Light => "Light session load. Safe to plan a quality session next.",
        }
    }
}

/// Load score and advice tier for a single session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionEstimate {
    /// Unitless load score
    pub load: Decimal,

    /// Advice tier the score falls into
    pub tier: AdviceTier,
}

/// Compute the unitless load score for one session.
///
/// Distance enters as unrounded kilometers. Runs weight elevation heavily
/// (hill running is expensive); rides weight both lightly (freewheeling
/// recovers distance cheaply); anything else gets a flat nominal load.
pub fn estimate_load(session: &Session) -> Decimal {
    let km = session.distance_km();
    let elev = session.elevation_gain();
    match session.kind {
        SportKind::Run => km * dec!(10) + elev * dec!(0.5),
        SportKind::Ride => km * dec!(2) + elev * dec!(0.2),
        SportKind::Other => dec!(30),
    }
}

/// Score one session and select its advice tier.
pub fn estimate(session: &Session) -> SessionEstimate {
    let load = estimate_load(session);
    SessionEstimate {
        load,
        tier: AdviceTier::from_load(load),
    }
}
