//! Coaching decision engine.
//!
//! One pass evaluates every eligible user against two rules: an inactivity
//! nudge and an overload warning. Each rule has its own cooldown timestamp,
//! and a fired nudge short-circuits the warning for that user that run. The
//! cooldown write happens only after a successful send, so a failed delivery
//! is retried on the next pass instead of being swallowed by the cooldown.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::Result;
use crate::fatigue::{FatigueConfig, FatigueScorer};
use crate::load::{round_whole, LoadAggregator};
use crate::models::{BatchReport, EligibleUser};
use crate::notify::Notifier;
use crate::trend;

/// Thresholds and cooldowns for the decision rules.
///
/// Defaults are behavioral contracts shared with the rest of the product;
/// override them only to match a deliberate policy change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Trailing window for load and fatigue signals, in days (default: 7)
    pub window_days: u32,

    /// Hours without a session before the inactivity nudge fires (default: 72)
    pub inactivity_hours: i64,

    /// Minimum hours between nudges to one user (default: 18)
    pub nudge_cooldown_hours: i64,

    /// Minimum hours between warnings to one user (default: 24)
    pub warn_cooldown_hours: i64,

    /// Week-over-week hours increase that counts as a spike (default: 0.30)
    pub spike_threshold: Decimal,

    /// Fatigue index at or above which the warning fires (default: 75)
    pub fatigue_warn_threshold: u8,

    /// Maximum users evaluated per pass (default: 500)
    pub user_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            window_days: 7,
            inactivity_hours: 72,
            nudge_cooldown_hours: 18,
            warn_cooldown_hours: 24,
            spike_threshold: dec!(0.30),
            fatigue_warn_threshold: 75,
            user_limit: 500,
        }
    }
}

/// What the rules decided for one user, before any side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// User has never logged a session; invite the first one
    Onboarding,

    /// No session for too long; remind with the elapsed whole hours
    Inactive { idle_hours: i64 },

    /// Load spike and/or high fatigue; at least one cause is present
    Overload {
        spike: Option<Decimal>,
        fatigue: Option<u8>,
    },

    /// Nothing fired
    NoAction,
}

impl Decision {
    /// The message this decision sends, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            Decision::Onboarding => Some(
                "No sessions on record yet. Start with an easy 20-30 minute run or ride and log it; I'll take it from there."
                    .to_string(),
            ),
            Decision::Inactive { idle_hours } => Some(format!(
                "It has been about {} hours since your last session. How about 20-30 easy minutes today?",
                idle_hours
            )),
            Decision::Overload { spike, fatigue } => {
                let mut reasons = Vec::new();
                if let Some(delta) = spike {
                    let pct = round_whole(delta * dec!(100)).to_i64().unwrap_or(0);
                    reasons.push(format!("training hours up {}% week over week", pct));
                }
                if let Some(index) = fatigue {
                    reasons.push(format!("high fatigue ({})", index));
                }
                Some(format!(
                    "⚠️ Overload risk: {}. Suggestion: reduce intensity for the next 2-3 days and prioritize sleep.",
                    reasons.join(" & ")
                ))
            }
            Decision::NoAction => None,
        }
    }

    /// Whether this decision is one of the two nudge branches
    pub fn is_nudge(&self) -> bool {
        matches!(self, Decision::Onboarding | Decision::Inactive { .. })
    }
}

/// Runs the nudge/warning rules over the eligible user list.
pub struct CoachEngine {
    config: EngineConfig,
    scorer: FatigueScorer,
}

impl Default for CoachEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachEngine {
    /// Engine with the default thresholds and fatigue weights
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), FatigueConfig::default())
    }

    /// Engine with custom thresholds and fatigue weights
    pub fn with_config(config: EngineConfig, fatigue: FatigueConfig) -> Self {
        CoachEngine {
            config,
            scorer: FatigueScorer::with_config(fatigue),
        }
    }

    /// Evaluate both rules for one user without performing any side effect.
    ///
    /// Rule order is load-bearing: a fired nudge suppresses the warning for
    /// this run even when the warning condition also holds, and that holds
    /// for both nudge branches.
    pub fn evaluate_user(
        &self,
        db: &Database,
        user: &EligibleUser,
        as_of: DateTime<Utc>,
    ) -> Result<Decision> {
        let last_session = db.last_session_time(user.user_id)?;
        let summary =
            LoadAggregator::summarize(db, user.user_id, self.config.window_days, as_of)?;
        // The prior band stays unrounded while the trailing week comes from
        // the display-rounded summary. Preserved asymmetry.
        let prev_hours = LoadAggregator::prior_band_hours(db, user.user_id, as_of)?;
        let delta = trend::percent_change(summary.total_hours, prev_hours);
        let (fatigue, _checkins) =
            self.scorer
                .score(db, user.user_id, self.config.window_days, as_of)?;
        let cooldown = db.fetch_cooldown(user.user_id)?;

        let can_nudge = cooldown_open(
            cooldown.last_nudge,
            self.config.nudge_cooldown_hours,
            as_of,
        );
        let can_warn = cooldown_open(
            cooldown.last_warning,
            self.config.warn_cooldown_hours,
            as_of,
        );

        debug!(
            user_id = user.user_id,
            hours = %summary.total_hours,
            prev_hours = %prev_hours,
            fatigue,
            can_nudge,
            can_warn,
            "signals evaluated"
        );

        if can_nudge {
            match last_session {
                None => return Ok(Decision::Onboarding),
                Some(last) => {
                    let idle = as_of.signed_duration_since(last);
                    if idle >= Duration::hours(self.config.inactivity_hours) {
                        let idle_hours =
                            round_whole(Decimal::from(idle.num_seconds()) / dec!(3600))
                                .to_i64()
                                .unwrap_or(0);
                        return Ok(Decision::Inactive { idle_hours });
                    }
                }
            }
        }

        if can_warn {
            let spike = delta.filter(|d| *d > self.config.spike_threshold);
            let tired = (fatigue >= self.config.fatigue_warn_threshold).then_some(fatigue);
            if spike.is_some() || tired.is_some() {
                return Ok(Decision::Overload {
                    spike,
                    fatigue: tired,
                });
            }
        }

        Ok(Decision::NoAction)
    }

    /// Run one decision pass over all eligible users.
    ///
    /// Per-user delivery failures are counted and skipped; store failures
    /// abort the whole pass. Users already processed keep their committed
    /// cooldown state either way.
    pub fn run_batch(
        &self,
        db: &Database,
        notifier: &dyn Notifier,
        as_of: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let users = db.list_eligible_users(self.config.user_limit)?;
        info!(
            users = users.len(),
            channel = notifier.channel_name(),
            "coaching pass started"
        );

        let mut report = BatchReport::default();
        for user in &users {
            report.users_processed += 1;
            let decision = self.evaluate_user(db, user, as_of)?;

            let text = match decision.message() {
                Some(text) => text,
                None => continue,
            };

            match notifier.notify(user, &text) {
                Ok(()) => {
                    if decision.is_nudge() {
                        db.set_last_nudge(user.user_id, as_of)?;
                        report.nudged += 1;
                        info!(user_id = user.user_id, ?decision, "nudge sent");
                    } else {
                        db.set_last_warning(user.user_id, as_of)?;
                        report.warned += 1;
                        info!(user_id = user.user_id, ?decision, "warning sent");
                    }
                }
                Err(e) => {
                    // Cooldown stays clear so the next pass retries.
                    warn!(user_id = user.user_id, error = %e, "delivery failed");
                    report.delivery_failures += 1;
                }
            }
        }

        info!(
            processed = report.users_processed,
            nudged = report.nudged,
            warned = report.warned,
            failures = report.delivery_failures,
            "coaching pass finished"
        );
        Ok(report)
    }
}

/// A cooldown is open when no timestamp is recorded or strictly more than
/// `hours` have elapsed since it.
fn cooldown_open(last: Option<DateTime<Utc>>, hours: i64, as_of: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(t) => as_of.signed_duration_since(t) > Duration::hours(hours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::models::{Checkin, Session, SportKind};
    use chrono::TimeZone;
    use std::cell::RefCell;

    /// Captures sent messages; optionally fails every delivery.
    struct RecordingNotifier {
        sent: RefCell<Vec<(i64, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            RecordingNotifier {
                sent: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            RecordingNotifier {
                sent: RefCell::new(Vec::new()),
                fail: true,
            }
        }

        fn messages(&self) -> Vec<(i64, String)> {
            self.sent.borrow().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, user: &EligibleUser, text: &str) -> std::result::Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::DeliveryFailed {
                    user_id: user.user_id,
                    reason: "chat unreachable".to_string(),
                });
            }
            self.sent.borrow_mut().push((user.user_id, text.to_string()));
            Ok(())
        }

        fn channel_name(&self) -> &'static str {
            "recording"
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(1, Some(900), true).unwrap();
        db
    }

    fn add_session(db: &Database, external_id: i64, start: DateTime<Utc>, time_s: u32) {
        db.upsert_session(&Session {
            user_id: 1,
            external_id,
            sport_type: "Run".to_string(),
            kind: SportKind::Run,
            start_time: start,
            distance_m: Some(Decimal::from(8000)),
            moving_time_s: Some(time_s),
            elevation_m: None,
            avg_heart_rate: None,
            name: None,
        })
        .unwrap();
    }

    fn add_sore_checkins(db: &Database, days: i64) {
        for i in 0..days {
            db.upsert_checkin(&Checkin {
                user_id: 1,
                day: as_of().date_naive() - Duration::days(i),
                sleep_hours: Some(dec!(4)),
                soreness: Some(5),
                mood: Some(1),
                note: None,
            })
            .unwrap();
        }
    }

    #[test]
    fn onboarding_nudge_beats_high_fatigue() {
        let db = test_db();
        add_sore_checkins(&db, 5); // fatigue well above the warning threshold
        let notifier = RecordingNotifier::new();
        let engine = CoachEngine::new();

        let report = engine.run_batch(&db, &notifier, as_of()).unwrap();
        assert_eq!(report.users_processed, 1);
        assert_eq!(report.nudged, 1);
        assert_eq!(report.warned, 0);

        // Exactly one message, and it is the onboarding nudge.
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("No sessions on record"));

        let cooldown = db.fetch_cooldown(1).unwrap();
        assert_eq!(cooldown.last_nudge, Some(as_of()));
        assert_eq!(cooldown.last_warning, None);
    }

    #[test]
    fn second_pass_is_suppressed_by_fresh_cooldown() {
        let db = test_db();
        let notifier = RecordingNotifier::new();
        let engine = CoachEngine::new();

        let first = engine.run_batch(&db, &notifier, as_of()).unwrap();
        let second = engine.run_batch(&db, &notifier, as_of()).unwrap();

        assert_eq!(first.nudged, 1);
        assert_eq!(second.nudged, 0);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn inactivity_nudge_names_rounded_hours() {
        let db = test_db();
        // 75.4 hours ago, past the 72 hour threshold.
        add_session(&db, 1, as_of() - Duration::minutes(75 * 60 + 24), 3600);
        let notifier = RecordingNotifier::new();
        let engine = CoachEngine::new();

        let decision = engine
            .evaluate_user(&db, &db.list_eligible_users(10).unwrap()[0], as_of())
            .unwrap();
        assert_eq!(decision, Decision::Inactive { idle_hours: 75 });

        let report = engine.run_batch(&db, &notifier, as_of()).unwrap();
        assert_eq!(report.nudged, 1);
        assert!(notifier.messages()[0].1.contains("about 75 hours"));
    }

    #[test]
    fn recent_activity_blocks_the_nudge_but_not_the_warning() {
        let db = test_db();
        // Active yesterday, but a week-over-week spike: 5 h this week vs 2 h
        // in the band.
        add_session(&db, 1, as_of() - Duration::days(1), 3600);
        add_session(&db, 2, as_of() - Duration::days(2), 3600);
        add_session(&db, 3, as_of() - Duration::days(3), 3600);
        add_session(&db, 4, as_of() - Duration::days(4), 3600);
        add_session(&db, 5, as_of() - Duration::days(5), 3600);
        add_session(&db, 6, as_of() - Duration::days(8), 2400);
        add_session(&db, 7, as_of() - Duration::days(9), 2400);
        add_session(&db, 8, as_of() - Duration::days(10), 2400);

        let engine = CoachEngine::new();
        let user = &db.list_eligible_users(10).unwrap()[0];
        let decision = engine.evaluate_user(&db, user, as_of()).unwrap();
        assert_eq!(
            decision,
            Decision::Overload {
                spike: Some(dec!(1.5)),
                fatigue: None,
            }
        );

        let notifier = RecordingNotifier::new();
        let report = engine.run_batch(&db, &notifier, as_of()).unwrap();
        assert_eq!(report.warned, 1);
        assert_eq!(report.nudged, 0);
        let text = &notifier.messages()[0].1;
        assert!(text.contains("150% week over week"));
        assert!(text.contains("Overload risk"));

        let cooldown = db.fetch_cooldown(1).unwrap();
        assert_eq!(cooldown.last_warning, Some(as_of()));
        assert_eq!(cooldown.last_nudge, None);
    }

    #[test]
    fn high_fatigue_warns_without_a_trend_baseline() {
        let db = test_db();
        add_session(&db, 1, as_of() - Duration::hours(5), 3600); // recent, no nudge
        add_sore_checkins(&db, 7);

        let engine = CoachEngine::new();
        let user = &db.list_eligible_users(10).unwrap()[0];
        let decision = engine.evaluate_user(&db, user, as_of()).unwrap();
        // No band sessions: delta is None, never treated as a spike.
        assert_eq!(
            decision,
            Decision::Overload {
                spike: None,
                fatigue: Some(100),
            }
        );

        let notifier = RecordingNotifier::new();
        engine.run_batch(&db, &notifier, as_of()).unwrap();
        let text = &notifier.messages()[0].1;
        assert!(text.contains("high fatigue (100)"));
        assert!(!text.contains("week over week"));
    }

    #[test]
    fn warning_message_combines_both_causes() {
        let decision = Decision::Overload {
            spike: Some(dec!(0.42)),
            fatigue: Some(81),
        };
        let text = decision.message().unwrap();
        assert!(text.contains("training hours up 42% week over week & high fatigue (81)"));
    }

    #[test]
    fn quiet_user_triggers_nothing() {
        let db = test_db();
        add_session(&db, 1, as_of() - Duration::hours(20), 3600);
        db.upsert_checkin(&Checkin {
            user_id: 1,
            day: as_of().date_naive(),
            sleep_hours: Some(dec!(8)),
            soreness: Some(2),
            mood: Some(4),
            note: None,
        })
        .unwrap();

        let engine = CoachEngine::new();
        let notifier = RecordingNotifier::new();
        let report = engine.run_batch(&db, &notifier, as_of()).unwrap();
        assert_eq!(report.nudged, 0);
        assert_eq!(report.warned, 0);
        assert!(notifier.messages().is_empty());
        assert_eq!(db.fetch_cooldown(1).unwrap(), Default::default());
    }

    #[test]
    fn nudge_cooldown_is_strictly_greater_than() {
        let db = test_db();
        let engine = CoachEngine::new();
        let user = EligibleUser {
            user_id: 1,
            chat_id: 900,
        };

        // Exactly 18 hours ago: still closed.
        db.set_last_nudge(1, as_of() - Duration::hours(18)).unwrap();
        assert_eq!(
            engine.evaluate_user(&db, &user, as_of()).unwrap(),
            Decision::NoAction
        );

        // One second past 18 hours: open again.
        db.set_last_nudge(1, as_of() - Duration::hours(18) - Duration::seconds(1))
            .unwrap();
        assert_eq!(
            engine.evaluate_user(&db, &user, as_of()).unwrap(),
            Decision::Onboarding
        );
    }

    #[test]
    fn warning_cooldown_suppresses_a_live_condition() {
        let db = test_db();
        add_session(&db, 1, as_of() - Duration::hours(5), 3600);
        add_sore_checkins(&db, 7);
        db.set_last_warning(1, as_of() - Duration::hours(24)).unwrap();

        let engine = CoachEngine::new();
        let user = EligibleUser {
            user_id: 1,
            chat_id: 900,
        };
        // Exactly 24 hours: suppressed.
        assert_eq!(
            engine.evaluate_user(&db, &user, as_of()).unwrap(),
            Decision::NoAction
        );

        // Past the cooldown the same live condition fires again.
        db.set_last_warning(1, as_of() - Duration::hours(25)).unwrap();
        assert!(matches!(
            engine.evaluate_user(&db, &user, as_of()).unwrap(),
            Decision::Overload { .. }
        ));
    }

    #[test]
    fn failed_delivery_keeps_cooldown_clear_for_retry() {
        let db = test_db();
        let engine = CoachEngine::new();

        let failing = RecordingNotifier::failing();
        let report = engine.run_batch(&db, &failing, as_of()).unwrap();
        assert_eq!(report.delivery_failures, 1);
        assert_eq!(report.nudged, 0);
        assert_eq!(db.fetch_cooldown(1).unwrap().last_nudge, None);

        // Next pass with a healthy channel delivers.
        let working = RecordingNotifier::new();
        let retry = engine
            .run_batch(&db, &working, as_of() + Duration::hours(1))
            .unwrap();
        assert_eq!(retry.nudged, 1);
        assert_eq!(working.messages().len(), 1);
    }

    #[test]
    fn disabled_and_addressless_users_are_skipped() {
        let db = test_db();
        db.upsert_user(2, None, true).unwrap();
        db.upsert_user(3, Some(903), false).unwrap();

        let engine = CoachEngine::new();
        let notifier = RecordingNotifier::new();
        let report = engine.run_batch(&db, &notifier, as_of()).unwrap();
        // Only user 1 is eligible; the others never reach evaluation.
        assert_eq!(report.users_processed, 1);
    }

    #[test]
    fn spike_threshold_is_strict() {
        let engine = CoachEngine::new();
        let db = test_db();
        // 1.3 h this week vs 1.0 h in the band: delta exactly 0.30.
        add_session(&db, 1, as_of() - Duration::days(1), 4680);
        add_session(&db, 2, as_of() - Duration::days(8), 3600);

        let user = EligibleUser {
            user_id: 1,
            chat_id: 900,
        };
        assert_eq!(
            engine.evaluate_user(&db, &user, as_of()).unwrap(),
            Decision::NoAction
        );
    }
}
