use crate::error::{EntryCheck, ServiceError, ServiceResult};
use crate::records::AttendanceStatus;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkAttendanceRequest {
    pub course_id: i64,
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
    #[serde(default)]
    pub marked_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkedRecord {
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkAttendanceOutcome {
    pub status: u16,
    pub batch_id: Uuid,
    pub course_id: i64,
    pub date: NaiveDate,
    pub written: usize,
    pub created: usize,
    pub updated: usize,
    pub records: Vec<MarkedRecord>,
}

struct CheckedEntry {
    student_id: i64,
    enrollment_id: i64,
    status: AttendanceStatus,
    notes: Option<String>,
}

fn active_enrollments(conn: &Connection, course_id: i64) -> rusqlite::Result<HashMap<i64, i64>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, id
         FROM enrollments
         WHERE course_id = ? AND is_active = 1",
    )?;
    let rows = stmt
        .query_map([course_id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

fn row_exists(conn: &Connection, sql: &str, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

/// Validates every entry before writing anything; a single bad entry rejects
/// the batch and the error carries the verdict for all of them.
fn check_entries(
    conn: &Connection,
    course_id: i64,
    entries: &[AttendanceEntry],
) -> ServiceResult<Vec<CheckedEntry>> {
    let enrolled = active_enrollments(conn, course_id)?;
    let mut checks = Vec::with_capacity(entries.len());
    let mut accepted = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let status = AttendanceStatus::parse(&entry.status);
        let enrollment_id = enrolled.get(&entry.student_id).copied();
        let reason = match (status, enrollment_id) {
            (Some(status), Some(enrollment_id)) => {
                accepted.push(CheckedEntry {
                    student_id: entry.student_id,
                    enrollment_id,
                    status,
                    notes: entry.notes.clone(),
                });
                None
            }
            (None, _) => Some(format!(
                "unknown status '{}' (expected PRESENT, ABSENT, LATE or EXCUSED)",
                entry.status
            )),
            (Some(_), None) => {
                if row_exists(conn, "SELECT 1 FROM students WHERE id = ?", entry.student_id)? {
                    Some(format!(
                        "student {} is not actively enrolled in course {}",
                        entry.student_id, course_id
                    ))
                } else {
                    Some(format!("student {} not found", entry.student_id))
                }
            }
        };
        checks.push(EntryCheck {
            index,
            student_id: entry.student_id,
            valid: reason.is_none(),
            reason,
        });
    }

    let rejected = checks.iter().filter(|c| !c.valid).count();
    if rejected > 0 {
        return Err(ServiceError::Validation {
            message: format!(
                "{} of {} attendance entries rejected; nothing was written",
                rejected,
                checks.len()
            ),
            entries: checks,
        });
    }
    Ok(accepted)
}

/// Last entry for a student wins; output keeps first-seen order.
fn collapse_duplicates(entries: Vec<CheckedEntry>) -> Vec<CheckedEntry> {
    let mut slot: HashMap<i64, usize> = HashMap::new();
    let mut out: Vec<CheckedEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match slot.get(&entry.student_id) {
            Some(&i) => out[i] = entry,
            None => {
                slot.insert(entry.student_id, out.len());
                out.push(entry);
            }
        }
    }
    out
}

pub fn bulk_mark(conn: &Connection, req: &BulkAttendanceRequest) -> ServiceResult<BulkAttendanceOutcome> {
    if req.records.is_empty() {
        return Err(ServiceError::bad_params("records must contain at least one entry"));
    }

    // Take the write lock up front so a concurrent writer is waited on via
    // busy_timeout. Dropping `tx` on any early return rolls the batch back.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    if !row_exists(&tx, "SELECT 1 FROM courses WHERE id = ?", req.course_id)? {
        return Err(ServiceError::not_found("course", req.course_id));
    }
    if let Some(teacher_id) = req.marked_by {
        if !row_exists(&tx, "SELECT 1 FROM teachers WHERE id = ?", teacher_id)? {
            return Err(ServiceError::not_found("teacher", teacher_id));
        }
    }

    let entries = match check_entries(&tx, req.course_id, &req.records) {
        Ok(entries) => collapse_duplicates(entries),
        Err(e) => {
            tracing::warn!(course_id = req.course_id, date = %req.date, error = %e, "bulk attendance rejected");
            return Err(e);
        }
    };

    let batch_id = Uuid::new_v4();
    let batch_key = batch_id.to_string();
    let updated_at = Utc::now().to_rfc3339();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let existed = tx
            .query_row(
                "SELECT 1 FROM attendance WHERE enrollment_id = ? AND date = ?",
                (entry.enrollment_id, req.date),
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        tx.execute(
            "INSERT INTO attendance(enrollment_id, date, status, notes, marked_by, batch_id, updated_at)
             VALUES(?1, ?2, ?3, COALESCE(?4, ''), ?5, ?6, ?7)
             ON CONFLICT(enrollment_id, date) DO UPDATE SET
               status = excluded.status,
               notes = COALESCE(?4, attendance.notes),
               marked_by = COALESCE(excluded.marked_by, attendance.marked_by),
               batch_id = excluded.batch_id,
               updated_at = excluded.updated_at",
            (
                entry.enrollment_id,
                req.date,
                entry.status.as_str(),
                entry.notes.as_deref(),
                req.marked_by,
                &batch_key,
                &updated_at,
            ),
        )?;
        records.push(MarkedRecord {
            student_id: entry.student_id,
            status: entry.status,
            created: !existed,
        });
    }

    tx.commit()?;

    let created = records.iter().filter(|r| r.created).count();
    let outcome = BulkAttendanceOutcome {
        status: 201,
        batch_id,
        course_id: req.course_id,
        date: req.date,
        written: records.len(),
        created,
        updated: records.len() - created,
        records,
    };
    tracing::info!(
        course_id = outcome.course_id,
        date = %outcome.date,
        batch_id = %outcome.batch_id,
        written = outcome.written,
        created = outcome.created,
        "bulk attendance committed"
    );
    Ok(outcome)
}
