//! Text and JSON renderings of sessions and training summaries.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::database::Database;
use crate::error::DatabaseError;
use crate::estimator;
use crate::fatigue::FatigueScorer;
use crate::load::{round2, round_whole, LoadAggregator};
use crate::models::{Checkin, LoadSummary, Session};

/// Render a second count as `{h}h {m}m`, or `{m}m {s}s` under an hour.
pub fn format_duration(total_s: u32) -> String {
    let h = total_s / 3600;
    let m = (total_s % 3600) / 60;
    let s = total_s % 60;
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m {}s", m, s)
    }
}

/// One session's figures plus its load estimate and advice line.
///
/// Missing distance, duration, and elevation read as zero; the heart-rate
/// line is omitted when absent.
pub fn session_report(session: &Session) -> String {
    let est = estimator::estimate(session);
    let km = round2(session.distance_km());
    let duration = format_duration(session.moving_time_s.unwrap_or(0));
    let elev = round_whole(session.elevation_gain()).to_i64().unwrap_or(0);
    let load = round_whole(est.load).to_i64().unwrap_or(0);

    let sport = if session.sport_type.is_empty() {
        "-"
    } else {
        session.sport_type.as_str()
    };

    let mut lines = vec![
        "✅ Session logged".to_string(),
        session.name.as_deref().unwrap_or("Untitled").to_string(),
        format!("Type: {}", sport),
        format!("Distance: {:.2} km", km),
        format!("Duration: {}", duration),
        format!("Elevation: {} m", elev),
    ];
    if let Some(hr) = session.avg_heart_rate {
        lines.push(format!("Avg HR: {}", hr));
    }
    lines.push(format!("Load (est): {}", load));
    lines.push(String::new());
    lines.push(format!("🧠 Coach note: {}", est.tier.recommendation()));

    lines.join("\n")
}

/// Everything the summary command shows for one user.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    /// Subject of the view
    pub user_id: i64,

    /// Evaluation instant the windows were measured back from
    pub generated_at: DateTime<Utc>,

    /// Most recent session on record, regardless of window
    pub last_session: Option<Session>,

    /// Windowed load summary
    pub summary: LoadSummary,

    /// Fatigue index over the same window
    pub fatigue_index: u8,

    /// Check-ins the fatigue index was scored from, newest first
    pub checkins: Vec<Checkin>,
}

impl SummaryView {
    /// Assemble the view from the store at one instant.
    pub fn collect(
        db: &Database,
        scorer: &FatigueScorer,
        user_id: i64,
        window_days: u32,
        as_of: DateTime<Utc>,
    ) -> Result<SummaryView, DatabaseError> {
        let summary = LoadAggregator::summarize(db, user_id, window_days, as_of)?;
        let (fatigue_index, checkins) = scorer.score(db, user_id, window_days, as_of)?;
        let last_session = db.latest_session(user_id)?;

        Ok(SummaryView {
            user_id,
            generated_at: as_of,
            last_session,
            summary,
            fatigue_index,
            checkins,
        })
    }

    /// Human-readable rendering, one block per section.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Training summary: last {} days\n",
            self.summary.window_days
        ));
        out.push_str(&format!("  Sessions:  {}\n", self.summary.sessions));
        out.push_str(&format!("  Distance:  {:.1} km\n", self.summary.total_km));
        out.push_str(&format!("  Duration:  {:.1} h\n", self.summary.total_hours));
        out.push_str(&format!("  Elevation: {} m\n", self.summary.total_elev_m));

        if !self.summary.by_type.is_empty() {
            out.push_str("\nBy type:\n");
            for (sport, figures) in &self.summary.by_type {
                out.push_str(&format!(
                    "  {:<12} {:>3} sessions {:>8.1} km {:>6.1} h {:>6} m\n",
                    sport, figures.sessions, figures.km, figures.hours, figures.elev_m
                ));
            }
        }

        out.push_str(&format!("\nFatigue index: {}\n", self.fatigue_index));

        if !self.checkins.is_empty() {
            out.push_str(&format!("Check-ins ({}):\n", self.checkins.len()));
            for checkin in &self.checkins {
                out.push_str(&format!("  {}\n", render_checkin(checkin)));
            }
        }

        if let Some(session) = &self.last_session {
            out.push_str(&format!(
                "\nLast session: {} ({}) on {}\n",
                session.name.as_deref().unwrap_or("Untitled"),
                if session.sport_type.is_empty() {
                    "-"
                } else {
                    session.sport_type.as_str()
                },
                session.start_time.format("%Y-%m-%d %H:%M UTC")
            ));
        }

        out
    }
}

fn render_checkin(checkin: &Checkin) -> String {
    let sleep = match checkin.sleep_hours {
        Some(hours) => format!("{}h", hours),
        None => "-".to_string(),
    };
    let soreness = match checkin.soreness {
        Some(level) => level.to_string(),
        None => "-".to_string(),
    };
    let mood = match checkin.mood {
        Some(level) => level.to_string(),
        None => "-".to_string(),
    };
    format!(
        "{}  sleep {}  soreness {}  mood {}",
        checkin.day, sleep, soreness, mood
    )
}
