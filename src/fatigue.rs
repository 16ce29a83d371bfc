//! Fatigue index scoring from subjective daily check-ins.
//!
//! A fixed, auditable heuristic, not a model: start from a baseline, add or
//! subtract per check-in according to sleep, soreness, and mood, penalize a
//! silent week, clamp to [0, 100]. All weights are integers and the sum is
//! order-independent; sleep hours only ever participate in comparisons.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::DatabaseError;
use crate::models::Checkin;

/// Tunable weights for the fatigue heuristic.
///
/// Defaults are the audited production values; changing them changes what the
/// warning rule considers "high fatigue", so treat overrides as a coaching
/// policy decision, not a tuning knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueConfig {
    /// Starting index before any check-in is applied (default: 35)
    pub baseline: i32,

    /// Added when a night's sleep is below `short_sleep_hours` (default: 8)
    pub short_sleep_penalty: i32,

    /// Sleep below this many hours counts as short (default: 6)
    pub short_sleep_hours: Decimal,

    /// Subtracted when sleep reaches `good_sleep_hours` (default: 5)
    pub good_sleep_bonus: i32,

    /// Sleep at or above this many hours counts as restorative (default: 7.5)
    pub good_sleep_hours: Decimal,

    /// Soreness level that neither adds nor subtracts (default: 2)
    pub soreness_neutral: i32,

    /// Index points per soreness level above neutral (default: 6)
    pub soreness_slope: i32,

    /// Mood level that neither adds nor subtracts (default: 3)
    pub mood_neutral: i32,

    /// Index points per mood level below neutral (default: 4)
    pub mood_slope: i32,

    /// Flat addition when the window holds no check-ins at all (default: 5)
    pub missing_checkin_penalty: i32,

    /// Most recent check-ins considered per scoring call (default: 14)
    pub checkin_limit: u32,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        FatigueConfig {
            baseline: 35,
            short_sleep_penalty: 8,
            short_sleep_hours: dec!(6),
            good_sleep_bonus: 5,
            good_sleep_hours: dec!(7.5),
            soreness_neutral: 2,
            soreness_slope: 6,
            mood_neutral: 3,
            mood_slope: 4,
            missing_checkin_penalty: 5,
            checkin_limit: 14,
        }
    }
}

/// Computes the 0-100 fatigue index for a user's recent check-ins.
pub struct FatigueScorer {
    config: FatigueConfig,
}

impl Default for FatigueScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FatigueScorer {
    /// Scorer with the default weights
    pub fn new() -> Self {
        Self::with_config(FatigueConfig::default())
    }

    /// Scorer with custom weights
    pub fn with_config(config: FatigueConfig) -> Self {
        FatigueScorer { config }
    }

    /// Score a set of check-ins, newest first.
    ///
    /// Only the first `checkin_limit` entries contribute, so callers passing
    /// a newest-first slice get the most recent records counted. The result
    /// is clamped to [0, 100].
    pub fn score_checkins(&self, checkins: &[Checkin]) -> u8 {
        let mut index = self.config.baseline;
        let mut counted = 0u32;

        for checkin in checkins.iter().take(self.config.checkin_limit as usize) {
            counted += 1;

            if let Some(sleep) = checkin.sleep_hours {
                if sleep < self.config.short_sleep_hours {
                    index += self.config.short_sleep_penalty;
                } else if sleep >= self.config.good_sleep_hours {
                    index -= self.config.good_sleep_bonus;
                }
                // Sleep between the two boundaries is neutral.
            }
            if let Some(soreness) = checkin.soreness {
                index += (i32::from(soreness) - self.config.soreness_neutral)
                    * self.config.soreness_slope;
            }
            if let Some(mood) = checkin.mood {
                index += (self.config.mood_neutral - i32::from(mood)) * self.config.mood_slope;
            }
        }

        if counted == 0 {
            // No self-report at all is mildly concerning, not neutral.
            index += self.config.missing_checkin_penalty;
        }

        index.clamp(0, 100) as u8
    }

    /// Fetch and score a user's check-ins over the trailing window.
    ///
    /// The window covers calendar days from `as_of - window_days` through
    /// today inclusive; at most `checkin_limit` of the newest rows are read.
    /// Returns the index together with the check-ins that produced it.
    pub fn score(
        &self,
        db: &Database,
        user_id: i64,
        window_days: u32,
        as_of: DateTime<Utc>,
    ) -> Result<(u8, Vec<Checkin>), DatabaseError> {
        let today = as_of.date_naive();
        let from = today - Duration::days(i64::from(window_days));
        let to = today + Duration::days(1);
        let checkins = db.checkins_in(user_id, from, to, self.config.checkin_limit)?;
        let index = self.score_checkins(&checkins);
        Ok((index, checkins))
    }
}
