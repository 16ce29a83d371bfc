use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed set of sport categories used by the load estimator.
///
/// Raw session types arrive as free-form provider strings ("Run", "TrailRun",
/// "VirtualRide", ...). They are mapped onto this enum once, at the ingestion
/// boundary, so everything downstream matches on a tagged category instead of
/// re-parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SportKind {
    Run,
    Ride,
    Other,
}

impl SportKind {
    /// Classify a raw sport-type string by case-insensitive substring match.
    ///
    /// "run" anywhere in the type wins over "ride" (a type containing both is
    /// treated as a run); anything else falls through to `Other`.
    pub fn classify(sport_type: &str) -> Self {
        let lower = sport_type.to_lowercase();
        if lower.contains("run") {
            SportKind::Run
        } else if lower.contains("ride") {
            SportKind::Ride
        } else {
            SportKind::Other
        }
    }
}

/// A single recorded exercise session.
///
/// Immutable fact once ingested; keyed by the provider's activity id with
/// last-write-wins semantics on re-ingestion. Numeric fields are optional
/// because upstream devices omit them freely; aggregation treats absent
/// values as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Owning user id
    pub user_id: i64,

    /// Provider-assigned activity id, unique per session (dedup key)
    pub external_id: i64,

    /// Free-form sport type as supplied by the provider, case preserved
    pub sport_type: String,

    /// Tagged sport category, assigned at ingestion from `sport_type`
    pub kind: SportKind,

    /// Session start time (UTC)
    pub start_time: DateTime<Utc>,

    /// Distance covered in meters
    pub distance_m: Option<Decimal>,

    /// Moving time in seconds
    pub moving_time_s: Option<u32>,

    /// Elevation gain in meters
    pub elevation_m: Option<Decimal>,

    /// Average heart rate in beats per minute
    pub avg_heart_rate: Option<u16>,

    /// Optional activity name from the provider
    pub name: Option<String>,
}

impl Session {
    /// Distance in kilometers, unrounded (0 when absent).
    pub fn distance_km(&self) -> Decimal {
        self.distance_m.unwrap_or(Decimal::ZERO) / Decimal::from(1000)
    }

    /// Elevation gain in meters, unrounded (0 when absent).
    pub fn elevation_gain(&self) -> Decimal {
        self.elevation_m.unwrap_or(Decimal::ZERO)
    }
}

/// A subjective daily check-in.
///
/// One row per (user, calendar day); re-recording the same day overwrites the
/// previous values. All signal fields are optional; the scorer skips absent
/// ones rather than defaulting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkin {
    /// Owning user id
    pub user_id: i64,

    /// Calendar day the check-in describes
    pub day: NaiveDate,

    /// Hours slept the previous night
    pub sleep_hours: Option<Decimal>,

    /// Muscle soreness on a 1 (none) to 5 (severe) scale
    pub soreness: Option<u8>,

    /// Mood on a 1 (poor) to 5 (great) scale
    pub mood: Option<u8>,

    /// Free-text note, never used by scoring
    pub note: Option<String>,
}

/// Aggregated load figures for one sport type within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeLoad {
    /// Number of sessions of this type
    pub sessions: u32,

    /// Total distance in kilometers, rounded to 1 decimal
    pub km: Decimal,

    /// Total moving time in hours, rounded to 1 decimal
    pub hours: Decimal,

    /// Total elevation gain in meters, rounded to the nearest integer
    pub elev_m: i64,
}

/// Windowed load summary for one user.
///
/// Totals are computed from the raw sums over all sessions and rounded once,
/// independently of the per-type figures. The rounded total can therefore
/// disagree with the sum of the rounded per-type values by a rounding step;
/// display code depends on this and it must not be "fixed" by summing the
/// per-type column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Window length in days
    pub window_days: u32,

    /// Total session count across all types
    pub sessions: u32,

    /// Total distance in kilometers, rounded to 1 decimal
    pub total_km: Decimal,

    /// Total moving time in hours, rounded to 1 decimal
    pub total_hours: Decimal,

    /// Total elevation gain in meters, rounded to the nearest integer
    pub total_elev_m: i64,

    /// Per-sport-type breakdown, keyed by the raw type string
    pub by_type: BTreeMap<String, TypeLoad>,
}

impl LoadSummary {
    /// An all-zero summary for a window with no sessions.
    pub fn empty(window_days: u32) -> Self {
        LoadSummary {
            window_days,
            sessions: 0,
            total_km: Decimal::ZERO,
            total_hours: Decimal::ZERO,
            total_elev_m: 0,
            by_type: BTreeMap::new(),
        }
    }
}

/// Per-user notification cooldown timestamps.
///
/// The only state the decision engine persists. Each field is set
/// independently, at most once per run, and only after the corresponding
/// notification was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CooldownState {
    /// When the last inactivity/onboarding nudge was sent
    pub last_nudge: Option<DateTime<Utc>>,

    /// When the last overload warning was sent
    pub last_warning: Option<DateTime<Utc>>,
}

/// A user the decision engine will evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleUser {
    /// User id
    pub user_id: i64,

    /// Delivery address for notifications (chat id)
    pub chat_id: i64,
}

/// Cached per-day load figures, refreshed by the snapshot job.
///
/// Raw sums, not display-rounded: rounding happens wherever these rows are
/// rendered. Never read by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    /// Owning user id
    pub user_id: i64,

    /// UTC calendar day the row covers
    pub day: NaiveDate,

    /// Session count that day
    pub sessions: u32,

    /// Summed distance in meters
    pub dist_m: i64,

    /// Summed moving time in seconds
    pub time_s: i64,

    /// Summed elevation gain in meters
    pub elev_m: i64,

    /// Rounded mean of the sessions' average heart rates, when any had one
    pub avg_hr: Option<u16>,

    /// When the row was last refreshed
    pub updated_at: DateTime<Utc>,
}

/// Outcome counters for one decision-engine batch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Users evaluated this pass
    pub users_processed: u32,

    /// Nudges delivered
    pub nudged: u32,

    /// Warnings delivered
    pub warned: u32,

    /// Notifications that failed to deliver (skipped, not retried this pass)
    pub delivery_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn classify_matches_substrings_case_insensitively() {
        assert_eq!(SportKind::classify("Run"), SportKind::Run);
        assert_eq!(SportKind::classify("TrailRun"), SportKind::Run);
        assert_eq!(SportKind::classify("VirtualRide"), SportKind::Ride);
        assert_eq!(SportKind::classify("RIDE"), SportKind::Ride);
        assert_eq!(SportKind::classify("Swim"), SportKind::Other);
        assert_eq!(SportKind::classify(""), SportKind::Other);
    }

    #[test]
    fn classify_prefers_run_over_ride() {
        // A type containing both substrings resolves to Run.
        assert_eq!(SportKind::classify("RunAndRide"), SportKind::Run);
    }

    #[test]
    fn session_unit_helpers_default_missing_to_zero() {
        let session = Session {
            user_id: 1,
            external_id: 100,
            sport_type: "Run".to_string(),
            kind: SportKind::Run,
            start_time: Utc::now(),
            distance_m: Some(dec!(8000)),
            moving_time_s: Some(3600),
            elevation_m: None,
            avg_heart_rate: None,
            name: None,
        };
        assert_eq!(session.distance_km(), dec!(8));
        assert_eq!(session.elevation_gain(), Decimal::ZERO);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary = LoadSummary::empty(7);
        assert_eq!(summary.sessions, 0);
        assert_eq!(summary.total_km, Decimal::ZERO);
        assert_eq!(summary.total_hours, Decimal::ZERO);
        assert_eq!(summary.total_elev_m, 0);
        assert!(summary.by_type.is_empty());
    }
}
