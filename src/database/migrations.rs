use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    create_attendance_records_table(pool).await?;
    create_face_enrollments_table(pool).await?;
    create_attendance_corrections_table(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            date DATE NOT NULL,
            check_in_at DATETIME,
            check_out_at DATETIME,
            check_in_location TEXT,
            check_out_location TEXT,
            check_in_device TEXT,
            check_out_device TEXT,
            check_in_face_score REAL,
            check_out_face_score REAL,
            work_hours REAL NOT NULL DEFAULT 0,
            overtime_hours REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN (
                'present', 'late', 'early_leave', 'absent',
                'leave', 'holiday', 'weekend', 'overtime'
            )),
            is_late BOOLEAN NOT NULL DEFAULT FALSE,
            is_early_leave BOOLEAN NOT NULL DEFAULT FALSE,
            is_corrected BOOLEAN NOT NULL DEFAULT FALSE,
            corrected_by TEXT,
            corrected_at DATETIME,
            original_check_in DATETIME,
            original_check_out DATETIME,
            notes TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE (user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_date ON attendance_records (date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_face_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS face_enrollments (
            user_id TEXT PRIMARY KEY,
            vector TEXT NOT NULL,
            model_version TEXT NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_corrections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_corrections (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            date DATE NOT NULL,
            actor_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
