//! Health-check persistence on top of [`HealthHistory`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, types::Type};

use crate::model::health::{HealthCheck, HealthHistory, TruncatedCheck};

use super::query::parse_column;

/// Load every stored check for `object_id`, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a stored timestamp is out of range.
pub fn load_history(conn: &Connection, object_id: &str) -> Result<HealthHistory> {
    let mut stmt = conn
        .prepare(
            "SELECT object_id, status, note, reported_by, reported_on_us, expiration_us \
             FROM health_checks WHERE object_id = ?1 ORDER BY reported_on_us ASC",
        )
        .context("prepare load_history")?;

    let rows = stmt
        .query_map(params![object_id], |row| {
            Ok(HealthCheck {
                object_id: row.get(0)?,
                status: parse_column(row, 1)?,
                note: row.get(2)?,
                reported_by: row.get(3)?,
                reported_on: from_micros(row, 4)?,
                expiration: from_micros(row, 5)?,
            })
        })
        .context("execute load_history")?;

    let mut checks = Vec::new();
    for row in rows {
        checks.push(row.context("read health check row")?);
    }
    Ok(HealthHistory::from_checks(object_id, checks))
}

/// Record `check`, applying the overlap rule to earlier checks, all in one
/// transaction.
///
/// # Errors
///
/// Returns an error if the check is rejected by [`HealthHistory::record`] or
/// any write fails. Nothing is written on error.
pub fn record_check(conn: &mut Connection, check: &HealthCheck) -> Result<Vec<TruncatedCheck>> {
    let tx = conn.transaction().context("begin health check transaction")?;

    let mut history = load_history(&tx, &check.object_id)?;
    let truncated = history
        .record(check.clone())
        .with_context(|| format!("record health check for '{}'", check.object_id))?;

    for change in &truncated {
        tx.execute(
            "UPDATE health_checks SET expiration_us = ?1 \
             WHERE object_id = ?2 AND reported_on_us = ?3",
            params![
                change.new_expiration.timestamp_micros(),
                check.object_id,
                change.reported_on.timestamp_micros()
            ],
        )
        .context("truncate overlapping health check")?;
    }

    tx.execute(
        "INSERT INTO health_checks \
         (object_id, status, note, reported_by, reported_on_us, expiration_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            check.object_id,
            check.status.as_str(),
            check.note,
            check.reported_by,
            check.reported_on.timestamp_micros(),
            check.expiration.timestamp_micros()
        ],
    )
    .context("insert health check")?;

    tx.commit().context("commit health check")?;

    if !truncated.is_empty() {
        tracing::debug!(
            object_id = %check.object_id,
            truncated = truncated.len(),
            "expired overlapping health checks"
        );
    }

    Ok(truncated)
}

/// The check in force for `object_id` at `now`.
///
/// # Errors
///
/// Returns an error if loading the history fails.
pub fn current_check(
    conn: &Connection,
    object_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<HealthCheck>> {
    Ok(load_history(conn, object_id)?.current(now).cloned())
}

fn from_micros(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {micros}").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::model::health::HealthStatus;
    use chrono::{Duration, TimeZone};

    fn test_db() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap()
    }

    fn check(day: u32, status: HealthStatus) -> HealthCheck {
        HealthCheck::with_lifetime("wi-7", status, "sam", at(day), Duration::days(14))
            .unwrap()
            .with_note("weekly sync")
    }

    #[test]
    fn record_and_reload_round_trip() {
        let mut conn = test_db();
        let truncated = record_check(&mut conn, &check(1, HealthStatus::Healthy)).unwrap();
        assert!(truncated.is_empty());

        let history = load_history(&conn, "wi-7").unwrap();
        assert_eq!(history.checks().len(), 1);
        assert_eq!(history.checks()[0], check(1, HealthStatus::Healthy));
    }

    #[test]
    fn second_check_truncates_first_in_store() {
        let mut conn = test_db();
        record_check(&mut conn, &check(1, HealthStatus::Healthy)).unwrap();
        let truncated = record_check(&mut conn, &check(3, HealthStatus::AtRisk)).unwrap();
        assert_eq!(truncated.len(), 1);

        let history = load_history(&conn, "wi-7").unwrap();
        assert_eq!(history.checks()[0].expiration, at(3));

        let current = current_check(&conn, "wi-7", at(4)).unwrap().unwrap();
        assert_eq!(current.status, HealthStatus::AtRisk);
    }

    #[test]
    fn rejected_check_writes_nothing() {
        let mut conn = test_db();
        record_check(&mut conn, &check(5, HealthStatus::Healthy)).unwrap();
        let err = record_check(&mut conn, &check(2, HealthStatus::Unhealthy)).unwrap_err();
        assert!(format!("{err:#}").contains("does not follow"));

        let history = load_history(&conn, "wi-7").unwrap();
        assert_eq!(history.checks().len(), 1);
        assert_eq!(history.checks()[0].expiration, at(19));
    }

    #[test]
    fn no_checks_means_no_current() {
        let conn = test_db();
        assert!(current_check(&conn, "wi-7", at(1)).unwrap().is_none());
    }
}
