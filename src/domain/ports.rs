use crate::domain::model::{
    AttendanceMark, AttendanceStatus, BulkEnrollResponse, CourseRef, EnrollmentRecord,
    RemoteEntryOutcome, SessionAttendanceRecord, StudentRef,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// 遠端出缺席服務。憑證缺失或過期時回傳 `AttendanceError::Unauthorized`。
#[async_trait]
pub trait RemoteAttendanceStore: Send + Sync {
    async fn bulk_enroll(&self, records: &[EnrollmentRecord]) -> Result<BulkEnrollResponse>;

    async fn submit_attendance(
        &self,
        course_code: &str,
        session_date: NaiveDate,
        entries: &[AttendanceMark],
    ) -> Result<Vec<RemoteEntryOutcome>>;

    async fn fetch_roster(&self, course_code: &str) -> Result<Vec<StudentRef>>;

    async fn fetch_course_attendance(
        &self,
        student_id: &str,
        course_code: &str,
    ) -> Result<Vec<AttendanceStatus>>;

    async fn fetch_student_courses(&self, student_id: &str) -> Result<Vec<CourseRef>>;

    async fn fetch_session_attendance(
        &self,
        course_code: &str,
        session_date: NaiveDate,
    ) -> Result<Vec<SessionAttendanceRecord>>;
}

/// 由外部驗證模組提供的 bearer token；沒有就是 None
pub trait CredentialProvider: Send + Sync {
    fn bearer(&self) -> Option<String>;
}
