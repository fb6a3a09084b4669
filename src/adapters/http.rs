use crate::domain::model::{
    status_from_wire, AttendanceMark, AttendanceStatus, BulkEnrollResponse, CourseRef,
    EnrollmentRecord, RemoteEntryOutcome, RemoteOutcome, SessionAttendanceRecord, StudentRef,
};
use crate::domain::ports::{CredentialProvider, RemoteAttendanceStore};
use crate::utils::error::{AttendanceError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
struct SubmitAttendanceBody<'a> {
    course_code: &'a str,
    date: NaiveDate,
    records: Vec<WireMark<'a>>,
}

#[derive(Serialize)]
struct WireMark<'a> {
    student_id: &'a str,
    status: &'static str,
}

#[derive(Deserialize)]
struct WireOutcome {
    #[serde(alias = "registration_number", alias = "studentId")]
    student_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireOutcome> for RemoteEntryOutcome {
    fn from(wire: WireOutcome) -> Self {
        let outcome = match (wire.error, wire.status) {
            (Some(error), _) => RemoteOutcome::Rejected(error),
            (None, Some(status)) => match AttendanceStatus::from_wire(&status) {
                AttendanceStatus::Unmarked => {
                    RemoteOutcome::Rejected(format!("unrecognized status '{}'", status))
                }
                confirmed => RemoteOutcome::Confirmed(confirmed),
            },
            (None, None) => RemoteOutcome::Rejected("missing status".to_string()),
        };
        Self {
            student_id: wire.student_id,
            outcome,
        }
    }
}

#[derive(Deserialize)]
struct WireSession {
    #[serde(deserialize_with = "status_from_wire", default)]
    status: AttendanceStatus,
}

/// 以 HTTP 呼叫後端的 RemoteAttendanceStore 實作。
/// 每個請求都附上 bearer token；沒有 token 時不發出請求。
pub struct HttpAttendanceStore<C: CredentialProvider> {
    client: Client,
    base_url: Url,
    credentials: C,
    timeout: Option<Duration>,
}

impl<C: CredentialProvider> HttpAttendanceStore<C> {
    pub fn new(base_url: &str, credentials: C) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AttendanceError::InvalidConfigValueError {
            field: "server.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AttendanceError::InvalidConfigValueError {
                field: "server.base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            credentials,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .credentials
            .bearer()
            .ok_or(AttendanceError::Unauthorized)?;
        let request = request.bearer_auth(token);
        Ok(match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = self.authorize(request)?;
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("📡 {} {}", status, response.url());

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AttendanceError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttendanceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        // 回應格式錯誤與傳輸失敗分開回報
        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::warn!("Unexpected response body from server: {}", e);
            AttendanceError::from(e)
        })
    }
}

#[async_trait]
impl<C: CredentialProvider> RemoteAttendanceStore for HttpAttendanceStore<C> {
    async fn bulk_enroll(&self, records: &[EnrollmentRecord]) -> Result<BulkEnrollResponse> {
        let url = self.endpoint(&["enrollments", "enroll"]);
        self.send(self.client.post(url).json(records)).await
    }

    async fn submit_attendance(
        &self,
        course_code: &str,
        session_date: NaiveDate,
        entries: &[AttendanceMark],
    ) -> Result<Vec<RemoteEntryOutcome>> {
        let records = entries
            .iter()
            .filter_map(|mark| {
                mark.status.as_wire().map(|status| WireMark {
                    student_id: &mark.student_id,
                    status,
                })
            })
            .collect();
        let body = SubmitAttendanceBody {
            course_code,
            date: session_date,
            records,
        };

        let url = self.endpoint(&["attendance", "record"]);
        let outcomes: Vec<WireOutcome> = self.send(self.client.post(url).json(&body)).await?;
        Ok(outcomes.into_iter().map(RemoteEntryOutcome::from).collect())
    }

    async fn fetch_roster(&self, course_code: &str) -> Result<Vec<StudentRef>> {
        let url = self.endpoint(&["students", "course", course_code]);
        self.send(self.client.get(url)).await
    }

    async fn fetch_course_attendance(
        &self,
        student_id: &str,
        course_code: &str,
    ) -> Result<Vec<AttendanceStatus>> {
        let url = self.endpoint(&["attendance", "student", student_id, "course", course_code]);
        let sessions: Vec<WireSession> = self.send(self.client.get(url)).await?;
        Ok(sessions.into_iter().map(|s| s.status).collect())
    }

    async fn fetch_student_courses(&self, student_id: &str) -> Result<Vec<CourseRef>> {
        let url = self.endpoint(&["courses", "getCoursesByStudentId", student_id]);
        self.send(self.client.get(url)).await
    }

    async fn fetch_session_attendance(
        &self,
        course_code: &str,
        session_date: NaiveDate,
    ) -> Result<Vec<SessionAttendanceRecord>> {
        let mut url = self.endpoint(&["attendance", "course", course_code, "by-date"]);
        url.query_pairs_mut()
            .append_pair("date", &session_date.to_string());
        self.send(self.client.get(url)).await
    }
}
