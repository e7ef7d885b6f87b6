use crate::attendance::error::StoreError;
use crate::database::models::{AttendanceRecord, FaceEnrollment};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Durable storage keyed by (user_id, date).
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn get_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Writes `record` only if the stored version still equals `expected_version`
    /// (0 = the record must not exist yet). Returns the stored record with its new version.
    async fn upsert_record(
        &self,
        record: &AttendanceRecord,
        expected_version: i64,
    ) -> Result<AttendanceRecord, StoreError>;
}

/// Read-only view of face enrollments owned by user management.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn get_enrollment(&self, user_id: &str) -> Result<Option<FaceEnrollment>, StoreError>;
}
