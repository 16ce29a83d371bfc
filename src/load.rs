//! Windowed load aggregation and daily load snapshots.
//!
//! Sessions are grouped by their raw sport-type string; each group gets
//! display-rounded figures (km and hours to 1 decimal, elevation to whole
//! meters). Totals are rounded from the raw sums across all sessions,
//! independently of the per-type rounding, so the total column can disagree
//! with the sum of the rounded per-type values by a rounding step. Downstream
//! display depends on that behavior; do not derive totals from the rounded
//! breakdown.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::database::Database;
use crate::error::DatabaseError;
use crate::models::{DailyLoad, LoadSummary, Session, TypeLoad};

/// Days the snapshot job covers when no count is given
pub const SNAPSHOT_DEFAULT_DAYS: u32 = 14;

/// Upper bound on the snapshot day count per invocation
pub const SNAPSHOT_MAX_DAYS: u32 = 30;

/// Round to one decimal, ties away from zero.
pub(crate) fn round1(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to two decimals, ties away from zero.
pub(crate) fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to a whole number, ties away from zero.
pub(crate) fn round_whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Running raw sums for one group of sessions.
#[derive(Debug, Default, Clone)]
struct RawTotals {
    sessions: u32,
    dist_m: Decimal,
    time_s: Decimal,
    elev_m: Decimal,
}

impl RawTotals {
    fn add(&mut self, session: &Session) {
        self.sessions += 1;
        self.dist_m += session.distance_m.unwrap_or(Decimal::ZERO);
        self.time_s += Decimal::from(session.moving_time_s.unwrap_or(0));
        self.elev_m += session.elevation_m.unwrap_or(Decimal::ZERO);
    }

    fn into_type_load(self) -> TypeLoad {
        TypeLoad {
            sessions: self.sessions,
            km: round1(self.dist_m / dec!(1000)),
            hours: round1(self.time_s / dec!(3600)),
            elev_m: round_whole(self.elev_m).to_i64().unwrap_or(0),
        }
    }
}

/// Reduce a window's sessions into per-type and total load figures.
///
/// A session with an empty sport-type string lands in the "Other" group.
/// Missing numeric fields count as zero. An empty slice yields an all-zero
/// summary, not an error.
pub fn summarize_sessions(sessions: &[Session], window_days: u32) -> LoadSummary {
    let mut overall = RawTotals::default();
    let mut groups: BTreeMap<String, RawTotals> = BTreeMap::new();

    for session in sessions {
        overall.add(session);
        let key = if session.sport_type.is_empty() {
            "Other".to_string()
        } else {
            session.sport_type.clone()
        };
        groups.entry(key).or_default().add(session);
    }

    let by_type: BTreeMap<String, TypeLoad> = groups
        .into_iter()
        .map(|(sport_type, raw)| (sport_type, raw.into_type_load()))
        .collect();

    LoadSummary {
        window_days,
        sessions: overall.sessions,
        total_km: round1(overall.dist_m / dec!(1000)),
        total_hours: round1(overall.time_s / dec!(3600)),
        total_elev_m: round_whole(overall.elev_m).to_i64().unwrap_or(0),
        by_type,
    }
}

/// Unrounded total moving hours of a session set.
///
/// The trend baseline for the prior band; kept at full precision on purpose,
/// while the trailing week's hours come display-rounded from the summary.
pub fn raw_hours(sessions: &[Session]) -> Decimal {
    let total_seconds: Decimal = sessions
        .iter()
        .map(|s| Decimal::from(s.moving_time_s.unwrap_or(0)))
        .sum();
    total_seconds / dec!(3600)
}

/// Reduce one UTC day's sessions into a snapshot row of raw sums.
pub fn daily_totals(
    user_id: i64,
    day: NaiveDate,
    sessions: &[Session],
    updated_at: DateTime<Utc>,
) -> DailyLoad {
    let mut raw = RawTotals::default();
    let mut hr_sum: u32 = 0;
    let mut hr_count: u32 = 0;

    for session in sessions {
        raw.add(session);
        if let Some(hr) = session.avg_heart_rate {
            hr_sum += u32::from(hr);
            hr_count += 1;
        }
    }

    let avg_hr = if hr_count > 0 {
        round_whole(Decimal::from(hr_sum) / Decimal::from(hr_count)).to_u16()
    } else {
        None
    };

    DailyLoad {
        user_id,
        day,
        sessions: raw.sessions,
        dist_m: round_whole(raw.dist_m).to_i64().unwrap_or(0),
        time_s: raw.time_s.to_i64().unwrap_or(0),
        elev_m: round_whole(raw.elev_m).to_i64().unwrap_or(0),
        avg_hr,
        updated_at,
    }
}

/// Store-backed aggregation entry points.
pub struct LoadAggregator;

impl LoadAggregator {
    /// Summarize a user's sessions over the trailing `[as_of - days, as_of)`
    /// window.
    pub fn summarize(
        db: &Database,
        user_id: i64,
        window_days: u32,
        as_of: DateTime<Utc>,
    ) -> Result<LoadSummary, DatabaseError> {
        let from = as_of - Duration::days(i64::from(window_days));
        let sessions = db.sessions_in(user_id, from, as_of)?;
        Ok(summarize_sessions(&sessions, window_days))
    }

    /// Unrounded moving hours in the prior band `[as_of - 14d, as_of - 7d)`.
    ///
    /// A dedicated band query: deriving this from a 14-day summary would
    /// double count the trailing week.
    pub fn prior_band_hours(
        db: &Database,
        user_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Decimal, DatabaseError> {
        let from = as_of - Duration::days(14);
        let to = as_of - Duration::days(7);
        let sessions = db.sessions_in(user_id, from, to)?;
        Ok(raw_hours(&sessions))
    }

    /// Refresh the daily_load cache for the `days` UTC days ending today.
    ///
    /// `days` is clamped to `[1, SNAPSHOT_MAX_DAYS]`. Returns the number of
    /// rows written. Re-running is idempotent; rows are refreshed in place.
    pub fn snapshot(
        db: &Database,
        user_id: i64,
        days: u32,
        as_of: DateTime<Utc>,
    ) -> Result<u32, DatabaseError> {
        let days = days.clamp(1, SNAPSHOT_MAX_DAYS);
        let mut written = 0;
        for i in 0..days {
            let day = (as_of - Duration::days(i64::from(i))).date_naive();
            let day_start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
            let day_end = day_start + Duration::days(1);
            let sessions = db.sessions_in(user_id, day_start, day_end)?;
            db.upsert_daily_load(&daily_totals(user_id, day, &sessions, as_of))?;
            written += 1;
        }
        Ok(written)
    }
}
