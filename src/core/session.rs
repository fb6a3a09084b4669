use crate::core::roster::AttendanceRoster;
use crate::core::submitter::{AttendanceSubmitter, SubmissionReport, SubmissionTicket};
use crate::core::{AttendanceSubmissionResult, RemoteAttendanceStore};
use crate::utils::error::{AttendanceError, Result};
use chrono::NaiveDate;

/// 一個操作情境中唯一的使用中點名表。
///
/// 切換課程或日期會建立新的點名表並取代舊的，舊點名表的送出回應
/// 之後抵達時會被丟棄。
pub struct RecordingSession<'a, S: ?Sized> {
    store: &'a S,
    active: Option<AttendanceRoster>,
}

impl<'a, S: RemoteAttendanceStore + ?Sized> RecordingSession<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            active: None,
        }
    }

    /// 取得課程名單並取代目前的點名表。取得失敗時保留原本的點名表。
    pub async fn open(
        &mut self,
        course_code: &str,
        session_date: NaiveDate,
    ) -> Result<&mut AttendanceRoster> {
        let students = self.store.fetch_roster(course_code).await?;
        let roster = AttendanceRoster::load(course_code, session_date, students);

        if let Some(previous) = &self.active {
            if previous.pending_count() > 0 {
                tracing::info!(
                    "Discarding {} unsubmitted marks for {} on {}",
                    previous.pending_count(),
                    previous.course_code(),
                    previous.session_date()
                );
            }
        }

        Ok(self.active.insert(roster))
    }

    pub fn roster(&self) -> Option<&AttendanceRoster> {
        self.active.as_ref()
    }

    pub fn roster_mut(&mut self) -> Option<&mut AttendanceRoster> {
        self.active.as_mut()
    }

    pub fn close(&mut self) -> Option<AttendanceRoster> {
        self.active.take()
    }

    /// 擷取目前 dirty 項目的快照；沒有使用中點名表時為 None
    pub fn begin_submission(&self) -> Option<SubmissionTicket> {
        self.active.as_ref().map(SubmissionTicket::capture)
    }

    /// 套用回應。點名表已被替換或關閉時回傳 `StaleSubmission`。
    pub fn complete_submission(
        &mut self,
        ticket: &SubmissionTicket,
        results: Vec<AttendanceSubmissionResult>,
    ) -> Result<SubmissionReport> {
        match self.active.as_mut() {
            Some(roster) => ticket.reconcile(roster, results),
            None => Err(AttendanceError::StaleSubmission {
                ticket: ticket.roster_id().value(),
            }),
        }
    }

    pub async fn submit(&mut self) -> Result<SubmissionReport> {
        let ticket = self
            .begin_submission()
            .ok_or(AttendanceError::NoActiveRoster)?;
        let results = AttendanceSubmitter::new(self.store).dispatch(&ticket).await;
        self.complete_submission(&ticket, results)
    }
}
