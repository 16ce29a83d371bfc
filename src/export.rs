//! Daily-load export to CSV and JSON.

use std::io::Write;
use std::str::FromStr;

use csv::Writer;

use crate::error::ImportExportError;
use crate::models::DailyLoad;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

/// Write daily-load rows in the requested format.
///
/// Rows are written in the order given; callers pass them newest day first.
pub fn write_daily_loads<W: Write>(
    rows: &[DailyLoad],
    format: ExportFormat,
    out: W,
) -> Result<(), ImportExportError> {
    match format {
        ExportFormat::Csv => write_csv(rows, out),
        ExportFormat::Json => write_json(rows, out),
    }
}

fn write_csv<W: Write>(rows: &[DailyLoad], out: W) -> Result<(), ImportExportError> {
    let mut writer = Writer::from_writer(out);

    writer.write_record([
        "user_id",
        "day",
        "sessions",
        "dist_m",
        "time_s",
        "elev_m",
        "avg_hr",
        "updated_at",
    ])?;

    for row in rows {
        writer.write_record([
            row.user_id.to_string(),
            row.day.to_string(),
            row.sessions.to_string(),
            row.dist_m.to_string(),
            row.time_s.to_string(),
            row.elev_m.to_string(),
            row.avg_hr.map_or(String::new(), |hr| hr.to_string()),
            row.updated_at.to_rfc3339(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_json<W: Write>(rows: &[DailyLoad], mut out: W) -> Result<(), ImportExportError> {
    serde_json::to_writer_pretty(&mut out, rows)?;
    out.write_all(b"\n")?;
    Ok(())
}
