//! Job repository: row-level operations on the `jobs` and `job_logs` tables.
//!
//! Functions take a borrowed `Connection` so callers can compose several of
//! them inside one transaction (`Transaction` derefs to `Connection`).

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub progress: u8,
    pub audio_path: String,
    pub output_path: Option<String>,
    pub subtitle_path: Option<String>,
    pub subtitle_fallback: bool,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            audio_path: row.get("audio_path")?,
            output_path: row.get("output_path")?,
            subtitle_path: row.get("subtitle_path")?,
            subtitle_fallback: row.get("subtitle_fallback")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, status, progress, audio_path, output_path, subtitle_path,
    subtitle_fallback, error, created_at, updated_at";

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, status, progress, audio_path, output_path, subtitle_path,
         subtitle_fallback, error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id,
            job.status,
            job.progress,
            job.audio_path,
            job.output_path,
            job.subtitle_path,
            job.subtitle_fallback,
            job.error,
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrites every mutable column of an existing row. `id`, `audio_path`
/// and `created_at` are never touched. Returns the number of rows changed.
pub fn update(conn: &Connection, job: &JobRow) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, progress = ?3, output_path = ?4, subtitle_path = ?5,
         subtitle_fallback = ?6, error = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            job.id,
            job.status,
            job.progress,
            job.output_path,
            job.subtitle_path,
            job.subtitle_fallback,
            job.error,
            job.updated_at,
        ],
    )?;
    Ok(changed)
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// All jobs in creation order, insertion order breaking ties.
pub fn list_all(conn: &Connection) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM jobs ORDER BY created_at ASC, rowid ASC",
        SELECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Moves the oldest queued job to `processing` and returns it.
///
/// Selection and transition happen in one statement, so two callers can
/// never claim the same row: the outer `status = 'queued'` guard makes the
/// loser's UPDATE match zero rows.
pub fn claim_next_queued(
    conn: &Connection,
    updated_at: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "UPDATE jobs SET status = 'processing', updated_at = ?1
                 WHERE id = (
                     SELECT id FROM jobs WHERE status = 'queued'
                     ORDER BY created_at ASC, rowid ASC LIMIT 1
                 ) AND status = 'queued'
                 RETURNING {}",
                SELECT_COLUMNS
            ),
            params![updated_at],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Appends log lines to a job, preserving their order.
pub fn append_logs(
    conn: &Connection,
    job_id: &str,
    lines: &[String],
    created_at: &str,
) -> Result<(), DatabaseError> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut stmt =
        conn.prepare("INSERT INTO job_logs (job_id, line, created_at) VALUES (?1, ?2, ?3)")?;
    for line in lines {
        stmt.execute(params![job_id, line, created_at])?;
    }
    Ok(())
}

/// Log lines of one job in append order.
pub fn logs_for(conn: &Connection, job_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT line FROM job_logs WHERE job_id = ?1 ORDER BY seq ASC")?;
    let lines = stmt
        .query_map(params![job_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Log lines of every job, grouped by job id, each group in append order.
pub fn all_logs(conn: &Connection) -> Result<HashMap<String, Vec<String>>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT job_id, line FROM job_logs ORDER BY seq ASC")?;
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (job_id, line) = row?;
        grouped.entry(job_id).or_default().push(line);
    }
    Ok(grouped)
}

/// Counts jobs with the given status.
pub fn count_by_status(conn: &Connection, status: &str) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE status = ?1",
        params![status],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// IDs of every job with the given status, oldest first.
pub fn ids_with_status(conn: &Connection, status: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn
        .prepare("SELECT id FROM jobs WHERE status = ?1 ORDER BY created_at ASC, rowid ASC")?;
    let ids = stmt
        .query_map(params![status], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str, created_at: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            status: "queued".to_string(),
            progress: 0,
            audio_path: format!("/tmp/uploads/{}.mp3", id),
            output_path: None,
            subtitle_path: None,
            subtitle_fallback: false,
            error: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        db.with_writer(|conn| insert(conn, &sample_job("job-1", "2026-01-01T00:00:00Z")))
            .unwrap();

        let found = db
            .with_reader(|conn| find_by_id(conn, "job-1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.status, "queued");
        assert_eq!(found.progress, 0);
        assert_eq!(found.audio_path, "/tmp/uploads/job-1.mp3");
        assert!(!found.subtitle_fallback);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        let found = db.with_reader(|conn| find_by_id(conn, "nonexistent")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = test_db();
        let job = sample_job("dup", "2026-01-01T00:00:00Z");
        db.with_writer(|conn| insert(conn, &job)).unwrap();
        assert!(db.with_writer(|conn| insert(conn, &job)).is_err());
    }

    #[test]
    fn test_update_overwrites_mutable_fields() {
        let db = test_db();
        let mut job = sample_job("job-2", "2026-01-01T00:00:00Z");
        db.with_writer(|conn| insert(conn, &job)).unwrap();

        job.status = "done".to_string();
        job.progress = 100;
        job.output_path = Some("/out/job-2.mp4".to_string());
        job.subtitle_path = Some("/out/job-2.srt".to_string());
        job.subtitle_fallback = true;
        job.updated_at = "2026-01-01T00:05:00Z".to_string();
        let changed = db.with_writer(|conn| update(conn, &job)).unwrap();
        assert_eq!(changed, 1);

        let found = db
            .with_reader(|conn| find_by_id(conn, "job-2"))
            .unwrap()
            .unwrap();
        assert_eq!(found, job);
    }

    #[test]
    fn test_update_missing_row_changes_nothing() {
        let db = test_db();
        let job = sample_job("ghost", "2026-01-01T00:00:00Z");
        let changed = db.with_writer(|conn| update(conn, &job)).unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_list_all_in_creation_order() {
        let db = test_db();
        db.with_writer(|conn| {
            insert(conn, &sample_job("b", "2026-01-02T00:00:00Z"))?;
            insert(conn, &sample_job("a", "2026-01-01T00:00:00Z"))?;
            insert(conn, &sample_job("c", "2026-01-02T00:00:00Z"))
        })
        .unwrap();

        let ids: Vec<String> = db
            .with_reader(list_all)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_claim_takes_oldest_queued() {
        let db = test_db();
        db.with_writer(|conn| {
            insert(conn, &sample_job("second", "2026-01-02T00:00:00Z"))?;
            insert(conn, &sample_job("first", "2026-01-01T00:00:00Z"))
        })
        .unwrap();

        let claimed = db
            .with_writer(|conn| claim_next_queued(conn, "2026-01-03T00:00:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, "first");
        assert_eq!(claimed.status, "processing");
        assert_eq!(claimed.updated_at, "2026-01-03T00:00:00Z");

        let next = db
            .with_writer(|conn| claim_next_queued(conn, "2026-01-03T00:00:01Z"))
            .unwrap()
            .unwrap();
        assert_eq!(next.id, "second");

        let none = db
            .with_writer(|conn| claim_next_queued(conn, "2026-01-03T00:00:02Z"))
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_claim_skips_non_queued() {
        let db = test_db();
        let mut done = sample_job("done", "2026-01-01T00:00:00Z");
        done.status = "done".to_string();
        db.with_writer(|conn| insert(conn, &done)).unwrap();

        let claimed = db
            .with_writer(|conn| claim_next_queued(conn, "2026-01-02T00:00:00Z"))
            .unwrap();
        assert!(claimed.is_none());
    }

    #[test]
    fn test_logs_are_ordered_per_job() {
        let db = test_db();
        db.with_writer(|conn| {
            insert(conn, &sample_job("l1", "2026-01-01T00:00:00Z"))?;
            insert(conn, &sample_job("l2", "2026-01-01T00:00:01Z"))?;
            append_logs(conn, "l1", &["one".to_string(), "two".to_string()], "t")?;
            append_logs(conn, "l2", &["other".to_string()], "t")?;
            append_logs(conn, "l1", &["three".to_string()], "t")
        })
        .unwrap();

        let lines = db.with_reader(|conn| logs_for(conn, "l1")).unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);

        let grouped = db.with_reader(all_logs).unwrap();
        assert_eq!(grouped["l1"].len(), 3);
        assert_eq!(grouped["l2"], vec!["other"]);
    }

    #[test]
    fn test_logs_require_existing_job() {
        let db = test_db();
        let result =
            db.with_writer(|conn| append_logs(conn, "missing", &["orphan".to_string()], "t"));
        assert!(result.is_err());
    }

    #[test]
    fn test_count_and_ids_by_status() {
        let db = test_db();
        let mut processing = sample_job("p1", "2026-01-01T00:00:00Z");
        processing.status = "processing".to_string();
        db.with_writer(|conn| {
            insert(conn, &sample_job("q1", "2026-01-01T00:00:00Z"))?;
            insert(conn, &sample_job("q2", "2026-01-01T00:00:01Z"))?;
            insert(conn, &processing)
        })
        .unwrap();

        assert_eq!(db.with_reader(|c| count_by_status(c, "queued")).unwrap(), 2);
        assert_eq!(db.with_reader(|c| count_by_status(c, "failed")).unwrap(), 0);
        assert_eq!(
            db.with_reader(|c| ids_with_status(c, "processing")).unwrap(),
            vec!["p1"]
        );
    }
}
