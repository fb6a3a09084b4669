use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 一筆選課紀錄，識別鍵為 (registration_number, course_code)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    registration_number: String,
    course_code: String,
}

impl EnrollmentRecord {
    /// 兩個欄位去除空白後皆不可為空，否則回傳原因
    pub fn new(
        registration_number: impl Into<String>,
        course_code: impl Into<String>,
    ) -> std::result::Result<Self, String> {
        let registration_number = registration_number.into().trim().to_string();
        let course_code = course_code.into().trim().to_string();

        if registration_number.is_empty() {
            return Err("registration number is empty".to_string());
        }
        if course_code.is_empty() {
            return Err("course code is empty".to_string());
        }

        Ok(Self {
            registration_number,
            course_code,
        })
    }

    pub fn registration_number(&self) -> &str {
        &self.registration_number
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.registration_number, &self.course_code)
    }
}

/// 解析後的單行內容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEntry {
    Candidate(EnrollmentRecord),
    Malformed { reason: String, raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// 原始檔案中的行號 (從 1 起算，含標題列)
    pub line_number: usize,
    pub entry: ParsedEntry,
}

/// 從單一檔案解析出的批次，只會被送出一次
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentBatch {
    lines: Vec<ParsedLine>,
}

impl EnrollmentBatch {
    pub fn new(lines: Vec<ParsedLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[ParsedLine] {
        &self.lines
    }

    pub fn candidates(&self) -> impl Iterator<Item = &EnrollmentRecord> {
        self.lines.iter().filter_map(|line| match &line.entry {
            ParsedEntry::Candidate(record) => Some(record),
            ParsedEntry::Malformed { .. } => None,
        })
    }

    pub fn malformed_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line.entry, ParsedEntry::Malformed { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<ParsedLine> {
        self.lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnrollmentOutcome {
    Accepted,
    DuplicateSkipped,
    /// 已送出，但伺服器只回傳統計數字，無法逐筆判定
    Submitted,
    Malformed(String),
}

impl EnrollmentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::DuplicateSkipped => "duplicate_skipped",
            Self::Submitted => "submitted",
            Self::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub line_number: usize,
    pub record: Option<EnrollmentRecord>,
    pub outcome: EnrollmentOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentReport {
    pub accepted: usize,
    pub skipped_duplicates: usize,
    pub malformed: usize,
    pub message: Option<String>,
    pub outcomes: Vec<RecordOutcome>,
}

/// 伺服器對批次選課的回應
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BulkEnrollResponse {
    #[serde(default, alias = "successful")]
    pub accepted: usize,
    #[serde(default)]
    pub skipped_duplicates: usize,
    #[serde(default)]
    pub message: Option<String>,
    /// 若伺服器有逐筆列出重複項目則使用之
    #[serde(default)]
    pub duplicates: Option<Vec<EnrollmentRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[default]
    Unmarked,
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// 伺服器端的字串；Unmarked 永遠不會送出
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            Self::Unmarked => None,
            Self::Present => Some("Present"),
            Self::Absent => Some("Absent"),
            Self::Late => Some("Late"),
        }
    }

    /// 無法辨識的狀態一律視為 Unmarked
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "Present" => Self::Present,
            "Absent" => Self::Absent,
            "Late" => Self::Late,
            _ => Self::Unmarked,
        }
    }

    pub fn is_marked(&self) -> bool {
        !matches!(self, Self::Unmarked)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire().unwrap_or("Unmarked"))
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Ok(Self::Present),
            "absent" | "a" => Ok(Self::Absent),
            "late" | "l" => Ok(Self::Late),
            "unmarked" | "u" => Ok(Self::Unmarked),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudentRef {
    #[serde(alias = "registration_number", alias = "registrationNumber")]
    pub student_id: String,
    #[serde(default, alias = "name")]
    pub display_name: String,
}

impl StudentRef {
    pub fn new(student_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// 點名表中的一列，只屬於建立它的 AttendanceRoster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub(crate) student_id: String,
    pub(crate) display_name: String,
    pub(crate) status: AttendanceStatus,
    pub(crate) dirty: bool,
}

impl RosterEntry {
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> AttendanceStatus {
        self.status
    }

    /// 本地修改過、尚未被伺服器確認
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceMark {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    Confirmed(AttendanceStatus),
    Rejected(String),
}

/// 伺服器針對單一學生的回覆
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntryOutcome {
    pub student_id: String,
    pub outcome: RemoteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Server(String),
    NoAcknowledgment,
    Transport(String),
    Unauthorized,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(message) => write!(f, "rejected by server: {}", message),
            Self::NoAcknowledgment => f.write_str("no server acknowledgment"),
            Self::Transport(message) => write!(f, "transport failure: {}", message),
            Self::Unauthorized => f.write_str("unauthorized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirmed(AttendanceStatus),
    Rejected(RejectionReason),
}

/// 單一學生的送出結果，附帶當時送出的狀態值供對帳使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSubmissionResult {
    pub student_id: String,
    pub sent: AttendanceStatus,
    pub outcome: SubmissionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub student_id: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseRef {
    pub course_code: String,
    #[serde(default)]
    pub course_name: String,
}

/// 依日期查詢某課程的出席紀錄
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAttendanceRecord {
    pub registration_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(deserialize_with = "status_from_wire")]
    pub status: AttendanceStatus,
}

impl SessionAttendanceRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

pub(crate) fn status_from_wire<'de, D>(deserializer: D) -> std::result::Result<AttendanceStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(AttendanceStatus::from_wire)
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAttendanceSummary {
    pub course_code: String,
    pub course_name: String,
    pub total_sessions: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub late_count: usize,
}

impl CourseAttendanceSummary {
    /// 尚無任何紀錄時回傳 None
    pub fn presence_ratio(&self) -> Option<f64> {
        self.ratio(self.present_count)
    }

    /// 遲到也算有出席
    pub fn attended_ratio(&self) -> Option<f64> {
        self.ratio(self.present_count + self.late_count)
    }

    fn ratio(&self, count: usize) -> Option<f64> {
        if self.total_sessions == 0 {
            None
        } else {
            Some(count as f64 / self.total_sessions as f64)
        }
    }
}
