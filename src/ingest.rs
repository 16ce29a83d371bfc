//! Session ingestion from JSON files.
//!
//! Realizes the provider's write path at the store boundary: records are
//! parsed leniently, numeric fields reading zero are stored as absent, and
//! the sport kind is classified here. Upserts are last-write-wins on the
//! provider's external id.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::database::Database;
use crate::error::{ImportExportError, Result};
use crate::models::{Session, SportKind};

/// One session as it appears in an import file.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecord {
    /// Provider-side activity id, the dedup key
    pub external_id: i64,

    /// Owner; absent records belong to the user the command ran for
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub sport_type: Option<String>,

    pub start_time: DateTime<Utc>,

    #[serde(default)]
    pub distance_m: Option<Decimal>,

    #[serde(default)]
    pub moving_time_s: Option<u32>,

    #[serde(default)]
    pub elevation_m: Option<Decimal>,

    #[serde(default)]
    pub avg_heart_rate: Option<u16>,

    #[serde(default)]
    pub name: Option<String>,
}

impl SessionRecord {
    /// Reject values outside their documented range.
    pub fn validate(&self) -> std::result::Result<(), ImportExportError> {
        if let Some(distance) = self.distance_m {
            if distance < Decimal::ZERO {
                return Err(ImportExportError::InvalidValue {
                    field: "distance_m".to_string(),
                    reason: format!("negative distance {}", distance),
                });
            }
        }
        if let Some(elevation) = self.elevation_m {
            if elevation < Decimal::ZERO {
                return Err(ImportExportError::InvalidValue {
                    field: "elevation_m".to_string(),
                    reason: format!("negative elevation {}", elevation),
                });
            }
        }
        Ok(())
    }

    /// Resolve into a session owned by `default_user` unless the record
    /// names its own owner. Zero readings become absent, matching how the
    /// upstream provider reports unmeasured fields.
    pub fn into_session(self, default_user: i64) -> Session {
        let sport_type = self.sport_type.unwrap_or_default();
        let kind = SportKind::classify(&sport_type);

        Session {
            user_id: self.user_id.unwrap_or(default_user),
            external_id: self.external_id,
            sport_type,
            kind,
            start_time: self.start_time,
            distance_m: self.distance_m.filter(|d| !d.is_zero()),
            moving_time_s: self.moving_time_s.filter(|t| *t > 0),
            elevation_m: self.elevation_m.filter(|e| !e.is_zero()),
            avg_heart_rate: self.avg_heart_rate.filter(|hr| *hr > 0),
            name: self.name,
        }
    }
}

/// Parse a JSON array of session records.
pub fn read_sessions_json(path: &Path) -> std::result::Result<Vec<SessionRecord>, ImportExportError> {
    let content = fs::read_to_string(path).map_err(|e| ImportExportError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let records: Vec<SessionRecord> =
        serde_json::from_str(&content).map_err(|e| ImportExportError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(records)
}

/// Import a file's sessions, owned by `default_user` where a record does not
/// say otherwise. Returns the stored count and the newest imported session.
pub fn import_sessions(
    db: &Database,
    path: &Path,
    default_user: i64,
) -> Result<(usize, Option<Session>)> {
    let records = read_sessions_json(path)?;

    let mut stored = 0usize;
    let mut newest: Option<Session> = None;
    for record in records {
        record.validate()?;
        let session = record.into_session(default_user);
        db.ensure_user(session.user_id)?;
        db.upsert_session(&session)?;
        stored += 1;

        let is_newer = newest
            .as_ref()
            .map(|n| session.start_time > n.start_time)
            .unwrap_or(true);
        if is_newer {
            newest = Some(session);
        }
    }

    info!(
        file = %path.display(),
        sessions = stored,
        "import finished"
    );
    Ok((stored, newest))
}
