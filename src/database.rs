//! SQLite store adapter.
//!
//! Owns the schema and every query the rest of the crate runs. Time ranges
//! are half-open `[from, to)` throughout; sessions upsert last-write-wins on
//! the provider's external id; check-ins and daily-load rows upsert on
//! (user, day). Cooldown writes touch only the column being set.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::DatabaseError;
use crate::models::{Checkin, CooldownState, DailyLoad, EligibleUser, Session, SportKind};

/// Database connection and management
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create or open a database at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, DatabaseError> {
        let conn = Connection::open(db_path).map_err(|e| DatabaseError::ConnectionFailed {
            reason: e.to_string(),
        })?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema with tables and indexes
    fn init_schema(&self) -> Result<(), DatabaseError> {
        // WAL for concurrent readers; NORMAL sync is safe with WAL
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                chat_id INTEGER,
                coach_enabled INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                external_id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                sport_type TEXT NOT NULL,
                start_time DATETIME NOT NULL,
                distance_m TEXT,
                moving_time_s INTEGER,
                elevation_m TEXT,
                avg_heart_rate INTEGER,
                name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,

                FOREIGN KEY (user_id) REFERENCES users (user_id)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkins (
                user_id INTEGER NOT NULL,
                day DATE NOT NULL,
                sleep_hours TEXT,
                soreness INTEGER,
                mood INTEGER,
                note TEXT,

                PRIMARY KEY (user_id, day),
                FOREIGN KEY (user_id) REFERENCES users (user_id)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS cooldowns (
                user_id INTEGER PRIMARY KEY,
                last_nudge DATETIME,
                last_warning DATETIME,

                FOREIGN KEY (user_id) REFERENCES users (user_id)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS daily_load (
                user_id INTEGER NOT NULL,
                day DATE NOT NULL,
                sessions INTEGER NOT NULL,
                dist_m INTEGER NOT NULL,
                time_s INTEGER NOT NULL,
                elev_m INTEGER NOT NULL,
                avg_hr INTEGER,
                updated_at DATETIME NOT NULL,

                PRIMARY KEY (user_id, day),
                FOREIGN KEY (user_id) REFERENCES users (user_id)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user_start ON sessions (user_id, start_time)",
            [],
        )?;

        Ok(())
    }

    // ---- users ----

    /// Create or update a user record
    pub fn upsert_user(
        &self,
        user_id: i64,
        chat_id: Option<i64>,
        coach_enabled: bool,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO users (user_id, chat_id, coach_enabled)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id) DO UPDATE SET
                chat_id = excluded.chat_id,
                coach_enabled = excluded.coach_enabled
            "#,
            params![user_id, chat_id, coach_enabled],
        )?;
        Ok(())
    }

    /// Create the user row if it is missing, leaving an existing row alone.
    ///
    /// Ingestion paths call this so sessions and check-ins can land before
    /// the user has registered a delivery address.
    pub fn ensure_user(&self, user_id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id) VALUES (?1)",
            params![user_id],
        )?;
        Ok(())
    }

    /// Toggle coaching for an existing user
    pub fn set_coach_enabled(&self, user_id: i64, enabled: bool) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE users SET coach_enabled = ?2 WHERE user_id = ?1",
            params![user_id, enabled],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                table: "users".to_string(),
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    /// Users the coaching pass will evaluate: a delivery address present and
    /// coaching not disabled, bounded and in stable order.
    pub fn list_eligible_users(&self, limit: u32) -> Result<Vec<EligibleUser>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, chat_id
            FROM users
            WHERE chat_id IS NOT NULL AND coach_enabled = 1
            ORDER BY user_id
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(EligibleUser {
                user_id: row.get("user_id")?,
                chat_id: row.get("chat_id")?,
            })
        })?;
        let mut users = Vec::new();
        for user in rows {
            users.push(user?);
        }
        Ok(users)
    }

    // ---- sessions ----

    /// Insert or overwrite a session, keyed by its provider activity id
    pub fn upsert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (
                external_id, user_id, sport_type, start_time,
                distance_m, moving_time_s, elevation_m, avg_heart_rate, name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (external_id) DO UPDATE SET
                user_id = excluded.user_id,
                sport_type = excluded.sport_type,
                start_time = excluded.start_time,
                distance_m = excluded.distance_m,
                moving_time_s = excluded.moving_time_s,
                elevation_m = excluded.elevation_m,
                avg_heart_rate = excluded.avg_heart_rate,
                name = excluded.name
            "#,
            params![
                session.external_id,
                session.user_id,
                session.sport_type,
                session.start_time,
                session.distance_m.map(|d| d.to_string()),
                session.moving_time_s,
                session.elevation_m.map(|e| e.to_string()),
                session.avg_heart_rate,
                session.name,
            ],
        )?;
        Ok(())
    }

    /// Sessions for a user in `[from, to)`, oldest first
    pub fn sessions_in(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT external_id, user_id, sport_type, start_time,
                   distance_m, moving_time_s, elevation_m, avg_heart_rate, name
            FROM sessions
            WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
            ORDER BY start_time
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, from, to], Self::session_from_row)?;
        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }

    /// Start time of the user's most recent session, if any
    pub fn last_session_time(&self, user_id: i64) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let latest: Option<DateTime<Utc>> = self.conn.query_row(
            "SELECT MAX(start_time) FROM sessions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// The user's most recent session, if any
    pub fn latest_session(&self, user_id: i64) -> Result<Option<Session>, DatabaseError> {
        let session = self
            .conn
            .query_row(
                r#"
                SELECT external_id, user_id, sport_type, start_time,
                       distance_m, moving_time_s, elevation_m, avg_heart_rate, name
                FROM sessions
                WHERE user_id = ?1
                ORDER BY start_time DESC
                LIMIT 1
                "#,
                params![user_id],
                Self::session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Look up a session by its provider activity id
    pub fn get_session(&self, external_id: i64) -> Result<Option<Session>, DatabaseError> {
        let session = self
            .conn
            .query_row(
                r#"
                SELECT external_id, user_id, sport_type, start_time,
                       distance_m, moving_time_s, elevation_m, avg_heart_rate, name
                FROM sessions
                WHERE external_id = ?1
                "#,
                params![external_id],
                Self::session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Helper to convert a database row into a Session.
    ///
    /// The sport kind is re-derived from the stored type string here, at the
    /// adapter boundary, so it is never persisted and cannot drift.
    fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
        let sport_type: String = row.get("sport_type")?;
        let kind = SportKind::classify(&sport_type);
        Ok(Session {
            external_id: row.get("external_id")?,
            user_id: row.get("user_id")?,
            sport_type,
            kind,
            start_time: row.get("start_time")?,
            distance_m: row
                .get::<_, Option<String>>("distance_m")?
                .and_then(|s| s.parse::<Decimal>().ok()),
            moving_time_s: row.get("moving_time_s")?,
            elevation_m: row
                .get::<_, Option<String>>("elevation_m")?
                .and_then(|s| s.parse::<Decimal>().ok()),
            avg_heart_rate: row.get("avg_heart_rate")?,
            name: row.get("name")?,
        })
    }

    // ---- check-ins ----

    /// Insert or overwrite the check-in for one (user, day)
    pub fn upsert_checkin(&self, checkin: &Checkin) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO checkins (user_id, day, sleep_hours, soreness, mood, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, day) DO UPDATE SET
                sleep_hours = excluded.sleep_hours,
                soreness = excluded.soreness,
                mood = excluded.mood,
                note = excluded.note
            "#,
            params![
                checkin.user_id,
                checkin.day,
                checkin.sleep_hours.map(|s| s.to_string()),
                checkin.soreness,
                checkin.mood,
                checkin.note,
            ],
        )?;
        Ok(())
    }

    /// Check-ins for a user with `from <= day < to`, newest first, capped at
    /// `limit` rows
    pub fn checkins_in(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Checkin>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, day, sleep_hours, soreness, mood, note
            FROM checkins
            WHERE user_id = ?1 AND day >= ?2 AND day < ?3
            ORDER BY day DESC
            LIMIT ?4
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, from, to, limit], |row| {
            Ok(Checkin {
                user_id: row.get("user_id")?,
                day: row.get("day")?,
                sleep_hours: row
                    .get::<_, Option<String>>("sleep_hours")?
                    .and_then(|s| s.parse::<Decimal>().ok()),
                soreness: row.get("soreness")?,
                mood: row.get("mood")?,
                note: row.get("note")?,
            })
        })?;
        let mut checkins = Vec::new();
        for checkin in rows {
            checkins.push(checkin?);
        }
        Ok(checkins)
    }

    // ---- cooldowns ----

    /// Cooldown timestamps for a user; a user without a row has both clear
    pub fn fetch_cooldown(&self, user_id: i64) -> Result<CooldownState, DatabaseError> {
        let state = self
            .conn
            .query_row(
                "SELECT last_nudge, last_warning FROM cooldowns WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(CooldownState {
                        last_nudge: row.get("last_nudge")?,
                        last_warning: row.get("last_warning")?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    /// Record a sent nudge; leaves the warning timestamp untouched
    pub fn set_last_nudge(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO cooldowns (user_id, last_nudge)
            VALUES (?1, ?2)
            ON CONFLICT (user_id) DO UPDATE SET last_nudge = excluded.last_nudge
            "#,
            params![user_id, at],
        )?;
        Ok(())
    }

    /// Record a sent warning; leaves the nudge timestamp untouched
    pub fn set_last_warning(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO cooldowns (user_id, last_warning)
            VALUES (?1, ?2)
            ON CONFLICT (user_id) DO UPDATE SET last_warning = excluded.last_warning
            "#,
            params![user_id, at],
        )?;
        Ok(())
    }

    // ---- daily load snapshots ----

    /// Insert or refresh one day's cached load row
    pub fn upsert_daily_load(&self, load: &DailyLoad) -> Result<(), DatabaseError> {
        self.conn.execute(
            r#"
            INSERT INTO daily_load (user_id, day, sessions, dist_m, time_s, elev_m, avg_hr, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (user_id, day) DO UPDATE SET
                sessions = excluded.sessions,
                dist_m = excluded.dist_m,
                time_s = excluded.time_s,
                elev_m = excluded.elev_m,
                avg_hr = excluded.avg_hr,
                updated_at = excluded.updated_at
            "#,
            params![
                load.user_id,
                load.day,
                load.sessions,
                load.dist_m,
                load.time_s,
                load.elev_m,
                load.avg_hr,
                load.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Snapshot rows for a user with `from <= day < to`, newest first
    pub fn daily_loads(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyLoad>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, day, sessions, dist_m, time_s, elev_m, avg_hr, updated_at
            FROM daily_load
            WHERE user_id = ?1 AND day >= ?2 AND day < ?3
            ORDER BY day DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, from, to], |row| {
            Ok(DailyLoad {
                user_id: row.get("user_id")?,
                day: row.get("day")?,
                sessions: row.get("sessions")?,
                dist_m: row.get("dist_m")?,
                time_s: row.get("time_s")?,
                elev_m: row.get("elev_m")?,
                avg_hr: row.get("avg_hr")?,
                updated_at: row.get("updated_at")?,
            })
        })?;
        let mut loads = Vec::new();
        for load in rows {
            loads.push(load?);
        }
        Ok(loads)
    }
}
