use crate::attendance::clock::{AttendanceClock, Correction, Punch, StatusOverride};
use crate::attendance::error::{PunchError, StoreError};
use crate::attendance::events::{DomainEvent, EventSink};
use crate::attendance::extractor::FaceExtractor;
use crate::attendance::face::{
    FaceDetections, FaceMatcher, FeatureVector, MatchResult, decode_image, select_primary_face,
};
use crate::attendance::policy::ClockPolicy;
use crate::attendance::store::{AttendanceStore, EnrollmentStore};
use crate::database::models::AttendanceRecord;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts at a conditional write before giving up on a hot record.
pub const MAX_WRITE_ATTEMPTS: usize = 3;
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PunchRequest {
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub location: Option<String>,
    pub device: Option<String>,
}

/// A single face verification attempt. Lives only for one pipeline call.
#[derive(Debug, Clone)]
pub struct FacePunchRequest {
    pub user_id: String,
    pub image: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub location: Option<String>,
    pub device: Option<String>,
}

pub struct AttendanceVerificationPipeline {
    clock: AttendanceClock,
    matcher: FaceMatcher,
    records: Arc<dyn AttendanceStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    extractor: Option<Arc<dyn FaceExtractor>>,
    events: Arc<dyn EventSink>,
    extraction_timeout: Duration,
    max_image_bytes: usize,
}

impl AttendanceVerificationPipeline {
    pub fn new(
        policy: ClockPolicy,
        records: Arc<dyn AttendanceStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            matcher: FaceMatcher::new(policy.face_match_threshold_percent),
            clock: AttendanceClock::new(policy),
            records,
            enrollments,
            extractor: None,
            events,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_face_extractor(
        mut self,
        extractor: Arc<dyn FaceExtractor>,
        timeout: Duration,
    ) -> Self {
        self.extractor = Some(extractor);
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn policy(&self) -> &ClockPolicy {
        self.clock.policy()
    }

    pub fn face_enabled(&self) -> bool {
        self.extractor.is_some()
    }

    pub async fn check_in(&self, request: PunchRequest) -> Result<AttendanceRecord, PunchError> {
        let punch = Punch {
            at: request.at,
            location: request.location,
            device: request.device,
            face_score: None,
        };
        self.punch_in(&request.user_id, punch, false).await
    }

    pub async fn check_out(&self, request: PunchRequest) -> Result<AttendanceRecord, PunchError> {
        let punch = Punch {
            at: request.at,
            location: request.location,
            device: request.device,
            face_score: None,
        };
        self.punch_out(&request.user_id, punch, false).await
    }

    pub async fn face_check_in(
        &self,
        attempt: FacePunchRequest,
    ) -> Result<AttendanceRecord, PunchError> {
        let result = self.verify_face(&attempt).await?;
        let punch = Punch {
            at: attempt.captured_at,
            location: attempt.location,
            device: attempt.device,
            face_score: Some(result.score),
        };
        self.punch_in(&attempt.user_id, punch, true).await
    }

    pub async fn face_check_out(
        &self,
        attempt: FacePunchRequest,
    ) -> Result<AttendanceRecord, PunchError> {
        let result = self.verify_face(&attempt).await?;
        let punch = Punch {
            at: attempt.captured_at,
            location: attempt.location,
            device: attempt.device,
            face_score: Some(result.score),
        };
        self.punch_out(&attempt.user_id, punch, true).await
    }

    pub async fn correct(
        &self,
        user_id: &str,
        date: NaiveDate,
        correction: Correction,
    ) -> Result<AttendanceRecord, PunchError> {
        let record = self
            .write_with_retry(user_id, date, correction.at, |current| {
                self.clock.correct(current, &correction)
            })
            .await?;

        info!(
            "Attendance corrected: user_id={}, date={}, actor={}, reason={}",
            user_id, date, correction.actor_id, correction.reason
        );
        self.events.emit(DomainEvent::AttendanceCorrected {
            user_id: user_id.to_string(),
            date,
            actor_id: correction.actor_id,
            reason: correction.reason,
            corrected_at: correction.at,
        });

        Ok(record)
    }

    pub async fn override_status(
        &self,
        user_id: &str,
        date: NaiveDate,
        status_override: StatusOverride,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, PunchError> {
        let record = self
            .write_with_retry(user_id, date, at, |current| {
                Ok(self.clock.override_status(current, status_override, at))
            })
            .await?;

        info!(
            "Attendance status set: user_id={}, date={}, status={}, actor={}",
            user_id, date, record.status, actor_id
        );
        self.events.emit(DomainEvent::AttendanceStatusOverridden {
            user_id: user_id.to_string(),
            date,
            status: record.status,
            actor_id: actor_id.to_string(),
        });

        Ok(record)
    }

    pub async fn record_for(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, PunchError> {
        Ok(self.records.get_record(user_id, date).await?)
    }

    /// Matches the submitted image against the user's enrollment. Never touches the record store.
    pub async fn verify_face(&self, attempt: &FacePunchRequest) -> Result<MatchResult, PunchError> {
        let enrollment = self
            .enrollments
            .get_enrollment(&attempt.user_id)
            .await?
            .ok_or(PunchError::NoEnrollment)?;

        let detections = self.extract(&attempt.image).await?;
        if detections.model_version != enrollment.model_version {
            return Err(PunchError::EnrollmentModelMismatch {
                enrolled: enrollment.model_version,
                sample: detections.model_version,
            });
        }

        let face = select_primary_face(detections.faces)?;
        let result = self.matcher.match_vectors(&enrollment.vector, &face.encoding)?;

        if !result.accepted {
            warn!(
                "Face match rejected: user_id={}, score={:.2}, threshold={:.2}",
                attempt.user_id,
                result.score,
                self.matcher.threshold_percent()
            );
            return Err(PunchError::MatchRejected {
                score: result.score,
            });
        }

        debug!(
            "Face match accepted: user_id={}, score={:.2}",
            attempt.user_id, result.score
        );
        Ok(result)
    }

    /// Feature vector of the primary face in `image`, with the model that produced it.
    pub async fn extract_features(
        &self,
        image: &[u8],
    ) -> Result<(FeatureVector, String), PunchError> {
        let detections = self.extract(image).await?;
        let face = select_primary_face(detections.faces)?;
        Ok((face.encoding, detections.model_version))
    }

    async fn extract(&self, image: &[u8]) -> Result<FaceDetections, PunchError> {
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            PunchError::ExtractorUnavailable("face verification is not configured".to_string())
        })?;

        let bytes = image.to_vec();
        let max_image_bytes = self.max_image_bytes;
        let frame = tokio::task::spawn_blocking(move || decode_image(&bytes, max_image_bytes))
            .await
            .map_err(|e| PunchError::InvalidImage(format!("decoder task failed: {}", e)))??;

        match tokio::time::timeout(self.extraction_timeout, extractor.detect(&frame)).await {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(e)) => {
                warn!("Face extraction failed: {:#}", e);
                Err(PunchError::ExtractorUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "Face extraction exceeded {:?}",
                    self.extraction_timeout
                );
                Err(PunchError::ExtractionTimeout)
            }
        }
    }

    async fn punch_in(
        &self,
        user_id: &str,
        punch: Punch,
        via_face: bool,
    ) -> Result<AttendanceRecord, PunchError> {
        let date = self.clock.record_date(punch.at);
        let record = self
            .write_with_retry(user_id, date, punch.at, |current| {
                self.clock.check_in(current, &punch)
            })
            .await?;

        info!(
            "Check-in recorded: user_id={}, date={}, status={}, via_face={}",
            user_id, date, record.status, via_face
        );
        self.events.emit(DomainEvent::AttendanceCheckedIn {
            user_id: user_id.to_string(),
            date,
            status: record.status,
            via_face,
        });

        Ok(record)
    }

    async fn punch_out(
        &self,
        user_id: &str,
        punch: Punch,
        via_face: bool,
    ) -> Result<AttendanceRecord, PunchError> {
        let date = self.resolve_check_out_date(user_id, punch.at).await?;
        let record = self
            .write_with_retry(user_id, date, punch.at, |current| {
                self.clock.check_out(current, &punch)
            })
            .await?;

        info!(
            "Check-out recorded: user_id={}, date={}, work_hours={:.2}, via_face={}",
            user_id, date, record.work_hours, via_face
        );
        self.events.emit(DomainEvent::AttendanceCheckedOut {
            user_id: user_id.to_string(),
            date,
            work_hours: record.work_hours,
            via_face,
        });

        Ok(record)
    }

    /// A check-out closes today's record, or yesterday's if that one is still open,
    /// nothing was punched today and the check-out reads earlier on the wall clock
    /// than yesterday's check-in.
    async fn resolve_check_out_date(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<NaiveDate, PunchError> {
        let today = self.clock.record_date(at);
        let todays = self.records.get_record(user_id, today).await?;
        if todays.is_some_and(|record| record.check_in_at.is_some()) {
            return Ok(today);
        }

        if let Some(yesterday) = today.pred_opt() {
            let previous = self.records.get_record(user_id, yesterday).await?;
            let overnight = previous.is_some_and(|record| {
                record.is_open()
                    && record
                        .check_in_at
                        .is_some_and(|check_in| self.clock.closes_overnight(check_in, at))
            });
            if overnight {
                debug!(
                    "Closing overnight shift: user_id={}, date={}",
                    user_id, yesterday
                );
                return Ok(yesterday);
            }
        }

        Ok(today)
    }

    /// Read, apply `transition`, conditionally write. A conflicting write means someone
    /// else changed the record, so the transition is re-evaluated on a fresh read.
    async fn write_with_retry<F>(
        &self,
        user_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
        transition: F,
    ) -> Result<AttendanceRecord, PunchError>
    where
        F: Fn(&AttendanceRecord) -> Result<AttendanceRecord, PunchError> + Send + Sync,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .records
                .get_record(user_id, date)
                .await?
                .unwrap_or_else(|| AttendanceRecord::new(user_id, date, now));

            let updated = transition(&current)?;

            match self.records.upsert_record(&updated, current.version).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::VersionConflict) => {
                    warn!(
                        "Version conflict on attendance record: user_id={}, date={}, attempt {}/{}",
                        user_id, date, attempt, MAX_WRITE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PunchError::StoreUnavailable(format!(
            "record kept changing after {} attempts",
            MAX_WRITE_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::events::tests::RecordingSink;
    use crate::attendance::face::tests::face;
    use crate::attendance::store::memory::MemoryStore;
    use crate::database::models::{AttendanceStatus, FaceEnrollment};
    use crate::utils::time::combine_date_time;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MODEL: &str = "test-model-v1";

    struct ScriptedExtractor {
        detections: FaceDetections,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn returning(faces: Vec<crate::attendance::face::DetectedFace>) -> Self {
            Self {
                detections: FaceDetections {
                    model_version: MODEL.to_string(),
                    faces,
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FaceExtractor for ScriptedExtractor {
        async fn detect(&self, _image: &RgbImage) -> anyhow::Result<FaceDetections> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    struct HangingExtractor;

    #[async_trait]
    impl FaceExtractor for HangingExtractor {
        async fn detect(&self, _image: &RgbImage) -> anyhow::Result<FaceDetections> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::bail!("should have timed out")
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        combine_date_time(
            date,
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            ClockPolicy::default().utc_offset,
        )
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::new(8, 8)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn enrollment() -> FaceEnrollment {
        FaceEnrollment {
            user_id: "alice".to_string(),
            vector: FeatureVector::new(vec![0.0, 0.0]),
            model_version: MODEL.to_string(),
            updated_at: at(monday(), 0, 0),
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        pipeline: AttendanceVerificationPipeline,
    }

    fn harness(extractor: Option<Arc<dyn FaceExtractor>>) -> Harness {
        let store = Arc::new(MemoryStore::default().with_enrollment(enrollment()));
        let sink = Arc::new(RecordingSink::default());
        let mut pipeline = AttendanceVerificationPipeline::new(
            ClockPolicy::default(),
            store.clone(),
            store.clone(),
            sink.clone(),
        );
        if let Some(extractor) = extractor {
            pipeline = pipeline.with_face_extractor(extractor, Duration::from_millis(50));
        }
        Harness {
            store,
            sink,
            pipeline,
        }
    }

    fn manual(hour: u32, minute: u32) -> PunchRequest {
        PunchRequest {
            user_id: "alice".to_string(),
            at: at(monday(), hour, minute),
            location: None,
            device: Some("test".to_string()),
        }
    }

    fn face_attempt(hour: u32, minute: u32) -> FacePunchRequest {
        FacePunchRequest {
            user_id: "alice".to_string(),
            image: png_bytes(),
            captured_at: at(monday(), hour, minute),
            location: Some("gate".to_string()),
            device: None,
        }
    }

    #[tokio::test]
    async fn accepted_face_checks_in_with_score() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![face(
            0,
            0,
            10,
            vec![0.1, 0.0],
        )]));
        let h = harness(Some(extractor.clone()));

        let record = h.pipeline.face_check_in(face_attempt(9, 0)).await.unwrap();
        assert_eq!(record.check_in_face_score, Some(90.0));
        assert_eq!(record.check_in_location.as_deref(), Some("gate"));
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.version, 1);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            h.sink.take(),
            vec![DomainEvent::AttendanceCheckedIn {
                user_id: "alice".to_string(),
                date: monday(),
                status: AttendanceStatus::Present,
                via_face: true,
            }]
        );
    }

    #[tokio::test]
    async fn rejected_match_leaves_record_untouched() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![face(
            0,
            0,
            10,
            vec![0.9, 0.0],
        )]));
        let h = harness(Some(extractor));
        h.pipeline.check_in(manual(9, 0)).await.unwrap();
        h.sink.take();

        let before = h.store.snapshot("alice", monday());
        let writes_before = h.store.upserts.load(Ordering::SeqCst);

        let err = h
            .pipeline
            .face_check_out(face_attempt(18, 0))
            .await
            .unwrap_err();
        assert_eq!(err, PunchError::MatchRejected { score: 10.0 });

        assert_eq!(h.store.snapshot("alice", monday()), before);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), writes_before);
        assert!(h.sink.take().is_empty());
    }

    #[tokio::test]
    async fn no_face_creates_nothing() {
        let h = harness(Some(Arc::new(ScriptedExtractor::returning(Vec::new()))));

        let err = h
            .pipeline
            .face_check_in(face_attempt(9, 0))
            .await
            .unwrap_err();
        assert_eq!(err, PunchError::NoFaceDetected);
        assert_eq!(h.store.snapshot("alice", monday()), None);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_user_has_no_enrollment() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![face(
            0,
            0,
            10,
            vec![0.0, 0.0],
        )]));
        let h = harness(Some(extractor.clone()));
        let mut attempt = face_attempt(9, 0);
        attempt.user_id = "mallory".to_string();

        let err = h.pipeline.face_check_in(attempt).await.unwrap_err();
        assert_eq!(err, PunchError::NoEnrollment);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_image_never_reaches_the_extractor() {
        let extractor = Arc::new(ScriptedExtractor::returning(Vec::new()));
        let h = harness(Some(extractor.clone()));
        let mut attempt = face_attempt(9, 0);
        attempt.image = b"GIF89a-but-not-really".to_vec();

        let err = h.pipeline.face_check_in(attempt).await.unwrap_err();
        assert!(matches!(err, PunchError::InvalidImage(_)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_image_is_refused_before_extraction() {
        let extractor = Arc::new(ScriptedExtractor::returning(Vec::new()));
        let mut h = harness(Some(extractor.clone()));
        h.pipeline = h.pipeline.with_max_image_bytes(16);

        let err = h
            .pipeline
            .face_check_in(face_attempt(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PunchError::InvalidImage(_)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn face_check_in_decodes_on_a_single_threaded_runtime() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![face(
            0,
            0,
            10,
            vec![0.0, 0.0],
        )]));
        let h = harness(Some(extractor));

        let record = h.pipeline.face_check_in(face_attempt(9, 0)).await.unwrap();
        assert_eq!(record.check_in_face_score, Some(100.0));
    }

    #[tokio::test]
    async fn slow_extraction_times_out() {
        let h = harness(Some(Arc::new(HangingExtractor)));

        let err = h
            .pipeline
            .face_check_in(face_attempt(9, 0))
            .await
            .unwrap_err();
        assert_eq!(err, PunchError::ExtractionTimeout);
        assert_eq!(h.store.snapshot("alice", monday()), None);
    }

    #[tokio::test]
    async fn face_punch_without_extractor_is_unavailable() {
        let h = harness(None);
        assert!(!h.pipeline.face_enabled());
        let err = h
            .pipeline
            .face_check_in(face_attempt(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PunchError::ExtractorUnavailable(_)));
    }

    #[tokio::test]
    async fn enrollment_from_another_model_is_refused() {
        let extractor = ScriptedExtractor {
            detections: FaceDetections {
                model_version: "other-model".to_string(),
                faces: vec![face(0, 0, 10, vec![0.0, 0.0])],
            },
            calls: AtomicUsize::new(0),
        };
        let h = harness(Some(Arc::new(extractor)));

        let err = h
            .pipeline
            .face_check_in(face_attempt(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PunchError::EnrollmentModelMismatch { .. }));
    }

    #[tokio::test]
    async fn largest_face_is_the_one_verified() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![
            face(0, 0, 10, vec![0.9, 0.0]),
            face(20, 20, 80, vec![0.05, 0.0]),
        ]));
        let h = harness(Some(extractor));

        let record = h.pipeline.face_check_in(face_attempt(9, 0)).await.unwrap();
        assert_eq!(record.check_in_face_score, Some(95.0));
    }

    #[tokio::test]
    async fn duplicate_manual_check_in_does_not_write() {
        let h = harness(None);
        h.pipeline.check_in(manual(9, 0)).await.unwrap();
        let err = h.pipeline.check_in(manual(9, 30)).await.unwrap_err();
        assert_eq!(err, PunchError::AlreadyCheckedIn);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.store.snapshot("alice", monday()).unwrap().check_in_at,
            Some(at(monday(), 9, 0))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_check_ins_succeed_at_most_once() {
        for _ in 0..20 {
            let h = harness(None);
            let pipeline = Arc::new(h.pipeline);

            let handles: Vec<_> = (0..2)
                .map(|i| {
                    let pipeline = pipeline.clone();
                    tokio::spawn(async move { pipeline.check_in(manual(9, i)).await })
                })
                .collect();

            let mut successes = 0;
            let mut duplicates = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => successes += 1,
                    Err(PunchError::AlreadyCheckedIn) => duplicates += 1,
                    Err(other) => panic!("unexpected outcome: {other:?}"),
                }
            }
            assert_eq!((successes, duplicates), (1, 1));
        }
    }

    #[tokio::test]
    async fn version_conflicts_are_retried() {
        let h = harness(None);
        h.store.fail_next_upserts(MAX_WRITE_ATTEMPTS - 1);

        let record = h.pipeline.check_in(manual(9, 0)).await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(
            h.store.upserts.load(Ordering::SeqCst),
            MAX_WRITE_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_store_unavailable() {
        let h = harness(None);
        h.store.fail_next_upserts(MAX_WRITE_ATTEMPTS);

        let err = h.pipeline.check_in(manual(9, 0)).await.unwrap_err();
        assert!(matches!(err, PunchError::StoreUnavailable(_)));
        assert_eq!(h.store.snapshot("alice", monday()), None);
        assert!(h.sink.take().is_empty());
    }

    #[tokio::test]
    async fn overnight_check_out_closes_previous_day() {
        let h = harness(None);
        h.pipeline.check_in(manual(23, 30)).await.unwrap();

        let tuesday = monday().succ_opt().unwrap();
        let record = h
            .pipeline
            .check_out(PunchRequest {
                at: at(tuesday, 0, 15),
                ..manual(0, 0)
            })
            .await
            .unwrap();

        assert_eq!(record.date, monday());
        assert_eq!(record.work_hours, 0.75);
        assert_eq!(h.store.snapshot("alice", tuesday), None);
    }

    #[tokio::test]
    async fn forgotten_check_out_is_not_closed_the_next_evening() {
        let h = harness(None);
        h.pipeline.check_in(manual(9, 0)).await.unwrap();
        let before = h.store.snapshot("alice", monday());
        h.sink.take();

        let tuesday = monday().succ_opt().unwrap();
        let err = h
            .pipeline
            .check_out(PunchRequest {
                at: at(tuesday, 18, 0),
                ..manual(0, 0)
            })
            .await
            .unwrap_err();

        assert_eq!(err, PunchError::NotCheckedInYet);
        assert_eq!(h.store.snapshot("alice", monday()), before);
        assert_eq!(h.store.snapshot("alice", tuesday), None);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), 1);
        assert!(h.sink.take().is_empty());
    }

    #[tokio::test]
    async fn check_out_with_nothing_open_is_rejected() {
        let h = harness(None);
        let err = h.pipeline.check_out(manual(18, 0)).await.unwrap_err();
        assert_eq!(err, PunchError::NotCheckedInYet);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn correction_is_attributed_and_persisted() {
        let h = harness(None);
        h.pipeline.check_in(manual(9, 5)).await.unwrap();
        h.sink.take();

        let record = h
            .pipeline
            .correct(
                "alice",
                monday(),
                Correction {
                    actor_id: "hr-admin".to_string(),
                    check_in: crate::attendance::clock::PunchCorrection::Set(at(monday(), 9, 0)),
                    check_out: crate::attendance::clock::PunchCorrection::Keep,
                    reason: "badge reader outage".to_string(),
                    at: at(monday(), 12, 0),
                },
            )
            .await
            .unwrap();

        assert_eq!(record.version, 2);
        assert_eq!(record.original_check_in, Some(at(monday(), 9, 5)));
        assert_eq!(
            h.sink.take(),
            vec![DomainEvent::AttendanceCorrected {
                user_id: "alice".to_string(),
                date: monday(),
                actor_id: "hr-admin".to_string(),
                reason: "badge reader outage".to_string(),
                corrected_at: at(monday(), 12, 0),
            }]
        );
    }

    #[tokio::test]
    async fn leave_override_creates_the_day() {
        let h = harness(None);
        let record = h
            .pipeline
            .override_status(
                "alice",
                monday(),
                StatusOverride::Leave,
                "hr-admin",
                at(monday(), 8, 0),
            )
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Leave);

        let record = h.pipeline.check_in(manual(10, 0)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Leave);
    }

    #[tokio::test]
    async fn enrollment_features_come_from_the_largest_face() {
        let extractor = Arc::new(ScriptedExtractor::returning(vec![
            face(0, 0, 10, vec![1.0, 1.0]),
            face(0, 50, 30, vec![0.2, 0.3]),
        ]));
        let h = harness(Some(extractor));

        let (vector, model) = h.pipeline.extract_features(&png_bytes()).await.unwrap();
        assert_eq!(vector, FeatureVector::new(vec![0.2, 0.3]));
        assert_eq!(model, MODEL);
    }
}
