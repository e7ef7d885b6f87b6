use crate::attendance::error::StoreError;
use crate::attendance::face::FeatureVector;
use crate::database::models::{AttendanceRecord, AttendanceStatus, CorrectionLog, FaceEnrollment};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const RECORD_COLUMNS: &str = "user_id, date, check_in_at, check_out_at, check_in_location, \
     check_out_location, check_in_device, check_out_device, check_in_face_score, \
     check_out_face_score, work_hours, overtime_hours, status, is_late, is_early_leave, \
     is_corrected, corrected_by, corrected_at, original_check_in, original_check_out, notes, \
     version, created_at, updated_at";

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<AttendanceStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(AttendanceRecord {
        user_id: row.try_get("user_id")?,
        date: row.try_get("date")?,
        check_in_at: row.try_get("check_in_at")?,
        check_out_at: row.try_get("check_out_at")?,
        check_in_location: row.try_get("check_in_location")?,
        check_out_location: row.try_get("check_out_location")?,
        check_in_device: row.try_get("check_in_device")?,
        check_out_device: row.try_get("check_out_device")?,
        check_in_face_score: row.try_get("check_in_face_score")?,
        check_out_face_score: row.try_get("check_out_face_score")?,
        work_hours: row.try_get("work_hours")?,
        overtime_hours: row.try_get("overtime_hours")?,
        status,
        is_late: row.try_get("is_late")?,
        is_early_leave: row.try_get("is_early_leave")?,
        is_corrected: row.try_get("is_corrected")?,
        corrected_by: row.try_get("corrected_by")?,
        corrected_at: row.try_get("corrected_at")?,
        original_check_in: row.try_get("original_check_in")?,
        original_check_out: row.try_get("original_check_out")?,
        notes: row.try_get("notes")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// Attendance record queries
pub async fn get_record(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM attendance_records WHERE user_id = ? AND date = ?",
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Inserts a record that must not exist yet. A concurrent insert surfaces as a version conflict.
pub async fn insert_record(
    pool: &SqlitePool,
    record: &AttendanceRecord,
) -> Result<AttendanceRecord, StoreError> {
    let result = sqlx::query(&format!(
        "INSERT INTO attendance_records ({}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        RECORD_COLUMNS
    ))
    .bind(&record.user_id)
    .bind(record.date)
    .bind(record.check_in_at)
    .bind(record.check_out_at)
    .bind(&record.check_in_location)
    .bind(&record.check_out_location)
    .bind(&record.check_in_device)
    .bind(&record.check_out_device)
    .bind(record.check_in_face_score)
    .bind(record.check_out_face_score)
    .bind(record.work_hours)
    .bind(record.overtime_hours)
    .bind(record.status.as_str())
    .bind(record.is_late)
    .bind(record.is_early_leave)
    .bind(record.is_corrected)
    .bind(&record.corrected_by)
    .bind(record.corrected_at)
    .bind(record.original_check_in)
    .bind(record.original_check_out)
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(AttendanceRecord {
            version: 1,
            ..record.clone()
        }),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::VersionConflict)
        }
        Err(e) => Err(e.into()),
    }
}

/// Overwrites the stored record only while its version is still `expected_version`.
pub async fn update_record(
    pool: &SqlitePool,
    record: &AttendanceRecord,
    expected_version: i64,
) -> Result<AttendanceRecord, StoreError> {
    let result = sqlx::query(
        "UPDATE attendance_records
         SET check_in_at = ?, check_out_at = ?, check_in_location = ?, check_out_location = ?,
             check_in_device = ?, check_out_device = ?, check_in_face_score = ?,
             check_out_face_score = ?, work_hours = ?, overtime_hours = ?, status = ?,
             is_late = ?, is_early_leave = ?, is_corrected = ?, corrected_by = ?,
             corrected_at = ?, original_check_in = ?, original_check_out = ?, notes = ?,
             updated_at = ?, version = version + 1
         WHERE user_id = ? AND date = ? AND version = ?",
    )
    .bind(record.check_in_at)
    .bind(record.check_out_at)
    .bind(&record.check_in_location)
    .bind(&record.check_out_location)
    .bind(&record.check_in_device)
    .bind(&record.check_out_device)
    .bind(record.check_in_face_score)
    .bind(record.check_out_face_score)
    .bind(record.work_hours)
    .bind(record.overtime_hours)
    .bind(record.status.as_str())
    .bind(record.is_late)
    .bind(record.is_early_leave)
    .bind(record.is_corrected)
    .bind(&record.corrected_by)
    .bind(record.corrected_at)
    .bind(record.original_check_in)
    .bind(record.original_check_out)
    .bind(&record.notes)
    .bind(record.updated_at)
    .bind(&record.user_id)
    .bind(record.date)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }

    Ok(AttendanceRecord {
        version: expected_version + 1,
        ..record.clone()
    })
}

pub async fn get_records_by_date_range(
    pool: &SqlitePool,
    user_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM attendance_records
         WHERE user_id = ? AND date >= ? AND date <= ?
         ORDER BY date ASC",
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

// Face enrollment queries
pub async fn get_enrollment(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<FaceEnrollment>, StoreError> {
    let row_opt = sqlx::query(
        "SELECT user_id, vector, model_version, updated_at FROM face_enrollments WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row_opt {
        Some(row) => {
            let vector: String = row.try_get("vector")?;
            let vector: FeatureVector = serde_json::from_str(&vector)
                .map_err(|e| StoreError::Corrupt(format!("face vector for {}: {}", user_id, e)))?;

            Ok(Some(FaceEnrollment {
                user_id: row.try_get("user_id")?,
                vector,
                model_version: row.try_get("model_version")?,
                updated_at: row.try_get("updated_at")?,
            }))
        }
        None => Ok(None),
    }
}

/// Registers or replaces a user's enrollment in a single statement.
pub async fn replace_enrollment(
    pool: &SqlitePool,
    enrollment: &FaceEnrollment,
) -> Result<(), StoreError> {
    let vector = serde_json::to_string(&enrollment.vector)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    sqlx::query(
        "INSERT INTO face_enrollments (user_id, vector, model_version, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
             vector = excluded.vector,
             model_version = excluded.model_version,
             updated_at = excluded.updated_at",
    )
    .bind(&enrollment.user_id)
    .bind(vector)
    .bind(&enrollment.model_version)
    .bind(enrollment.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

// Correction audit queries
pub async fn insert_correction_log(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
    actor_id: &str,
    reason: &str,
    created_at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        "INSERT INTO attendance_corrections (user_id, date, actor_id, reason, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(date)
    .bind(actor_id)
    .bind(reason)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_correction_logs(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Vec<CorrectionLog>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, user_id, date, actor_id, reason, created_at
         FROM attendance_corrections
         WHERE user_id = ? AND date = ?
         ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    let logs = rows
        .into_iter()
        .map(|row| CorrectionLog {
            id: row.get("id"),
            user_id: row.get("user_id"),
            date: row.get("date"),
            actor_id: row.get("actor_id"),
            reason: row.get("reason"),
            created_at: row.get("created_at"),
        })
        .collect();

    Ok(logs)
}
