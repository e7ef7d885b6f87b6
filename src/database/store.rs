use crate::attendance::error::StoreError;
use crate::attendance::store::{AttendanceStore, EnrollmentStore};
use crate::database::models::{AttendanceRecord, FaceEnrollment};
use crate::database::queries;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

/// SQLite-backed record and enrollment storage.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for SqliteStore {
    async fn get_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        queries::get_record(&self.pool, user_id, date).await
    }

    async fn upsert_record(
        &self,
        record: &AttendanceRecord,
        expected_version: i64,
    ) -> Result<AttendanceRecord, StoreError> {
        if expected_version == 0 {
            queries::insert_record(&self.pool, record).await
        } else {
            queries::update_record(&self.pool, record, expected_version).await
        }
    }
}

#[async_trait]
impl EnrollmentStore for SqliteStore {
    async fn get_enrollment(&self, user_id: &str) -> Result<Option<FaceEnrollment>, StoreError> {
        queries::get_enrollment(&self.pool, user_id).await
    }
}
