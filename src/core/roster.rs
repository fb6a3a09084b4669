use crate::core::{
    AttendanceStatus, AttendanceSubmissionResult, Rejection, RosterEntry, StudentRef,
    SubmissionOutcome,
};
use crate::utils::error::{AttendanceError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ROSTER_ID: AtomicU64 = AtomicU64::new(1);

/// 每次建立點名表都會拿到新的 id，用來辨識過期的送出回應
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RosterId(u64);

impl RosterId {
    fn next() -> Self {
        Self(NEXT_ROSTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// `apply_confirmed` 實際套用的結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedResults {
    pub applied: usize,
    /// 送出後又被修改，確認未套用的學生
    pub superseded: Vec<String>,
    pub rejections: Vec<Rejection>,
}

/// 單一 (課程, 日期) 的點名表。
///
/// 日期在整個生命週期內不變；換日期就建立新的點名表。
/// 每列帶有 dirty 旗標，由 `set_status` 設定，只有在伺服器確認的狀態
/// 與目前狀態相同時才由 `apply_confirmed` 清除。
#[derive(Debug)]
pub struct AttendanceRoster {
    id: RosterId,
    course_code: String,
    session_date: NaiveDate,
    entries: Vec<RosterEntry>,
    index: HashMap<String, usize>,
}

impl AttendanceRoster {
    pub fn load(
        course_code: impl Into<String>,
        session_date: NaiveDate,
        students: impl IntoIterator<Item = StudentRef>,
    ) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for student in students {
            let student_id = student.student_id.trim().to_string();
            if student_id.is_empty() {
                tracing::warn!("Skipping roster student with empty id");
                continue;
            }
            if index.contains_key(&student_id) {
                tracing::warn!("Duplicate student {} in roster, keeping first", student_id);
                continue;
            }

            index.insert(student_id.clone(), entries.len());
            entries.push(RosterEntry {
                student_id,
                display_name: student.display_name,
                status: AttendanceStatus::Unmarked,
                dirty: false,
            });
        }

        let roster = Self {
            id: RosterId::next(),
            course_code: course_code.into(),
            session_date,
            entries,
            index,
        };
        tracing::debug!(
            "Loaded roster {} for {} on {} with {} students",
            roster.id.value(),
            roster.course_code,
            roster.session_date,
            roster.entries.len()
        );
        roster
    }

    pub fn id(&self) -> RosterId {
        self.id
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 依原始取得順序列出
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn entry(&self, student_id: &str) -> Option<&RosterEntry> {
        self.index.get(student_id).map(|&i| &self.entries[i])
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) -> Result<()> {
        let i = *self
            .index
            .get(student_id)
            .ok_or_else(|| AttendanceError::UnknownStudent(student_id.to_string()))?;

        let entry = &mut self.entries[i];
        entry.status = status;
        entry.dirty = true;
        Ok(())
    }

    /// 全部標記為同一狀態 (例如先全設為出席，再個別調整)
    pub fn mark_all(&mut self, status: AttendanceStatus) {
        for entry in &mut self.entries {
            entry.status = status;
            entry.dirty = true;
        }
    }

    /// 待送出的項目：dirty 且已做出決定。未標記的學生永遠不會送出。
    pub fn pending_entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.dirty && entry.status.is_marked())
    }

    pub fn pending_count(&self) -> usize {
        self.pending_entries().count()
    }

    /// 套用伺服器結果。
    ///
    /// Confirmed 只在目前狀態仍等於當初送出的值時才覆寫並清除 dirty；
    /// 送出後又被修改的項目保持原樣並列入 superseded。Rejected 不改動本地狀態。
    pub fn apply_confirmed(&mut self, results: &[AttendanceSubmissionResult]) -> AppliedResults {
        let mut outcome = AppliedResults::default();

        for result in results {
            let Some(&i) = self.index.get(&result.student_id) else {
                tracing::warn!(
                    "Ignoring submission result for unknown student {}",
                    result.student_id
                );
                continue;
            };
            let entry = &mut self.entries[i];

            match &result.outcome {
                SubmissionOutcome::Confirmed(confirmed) => {
                    if entry.status == result.sent {
                        entry.status = *confirmed;
                        entry.dirty = false;
                        outcome.applied += 1;
                    } else {
                        tracing::debug!(
                            "Student {} changed to {} after sending {}, keeping local edit",
                            entry.student_id,
                            entry.status,
                            result.sent
                        );
                        outcome.superseded.push(result.student_id.clone());
                    }
                }
                SubmissionOutcome::Rejected(reason) => {
                    outcome.rejections.push(Rejection {
                        student_id: result.student_id.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        outcome
    }
}
