use crate::core::roster::{AppliedResults, AttendanceRoster, RosterId};
use crate::core::{
    AttendanceMark, AttendanceStatus, AttendanceSubmissionResult, Rejection, RejectionReason,
    RemoteAttendanceStore, RemoteEntryOutcome, RemoteOutcome, SubmissionOutcome,
};
use crate::utils::error::{AttendanceError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// 送出當下的 dirty 項目快照，附上每筆送出的狀態值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    roster_id: RosterId,
    course_code: String,
    session_date: NaiveDate,
    marks: Vec<AttendanceMark>,
}

impl SubmissionTicket {
    pub fn capture(roster: &AttendanceRoster) -> Self {
        let marks = roster
            .pending_entries()
            .map(|entry| AttendanceMark {
                student_id: entry.student_id().to_string(),
                status: entry.status(),
            })
            .collect();

        Self {
            roster_id: roster.id(),
            course_code: roster.course_code().to_string(),
            session_date: roster.session_date(),
            marks,
        }
    }

    pub fn roster_id(&self) -> RosterId {
        self.roster_id
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    pub fn marks(&self) -> &[AttendanceMark] {
        &self.marks
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// 將結果套用到點名表；點名表已被替換時丟棄回應
    pub fn reconcile(
        &self,
        roster: &mut AttendanceRoster,
        results: Vec<AttendanceSubmissionResult>,
    ) -> Result<SubmissionReport> {
        if roster.id() != self.roster_id {
            tracing::debug!(
                "Discarding response for roster {}, active roster is {}",
                self.roster_id.value(),
                roster.id().value()
            );
            return Err(AttendanceError::StaleSubmission {
                ticket: self.roster_id.value(),
            });
        }

        let applied = roster.apply_confirmed(&results);
        Ok(SubmissionReport::new(results, applied))
    }

    fn reject_all(&self, reason: RejectionReason) -> Vec<AttendanceSubmissionResult> {
        self.marks
            .iter()
            .map(|mark| AttendanceSubmissionResult {
                student_id: mark.student_id.clone(),
                sent: mark.status,
                outcome: SubmissionOutcome::Rejected(reason.clone()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    pub results: Vec<AttendanceSubmissionResult>,
    pub rejections: Vec<Rejection>,
    /// 伺服器已確認，但送出後本地又被修改而未套用的學生
    pub superseded: Vec<String>,
    applied: usize,
}

impl SubmissionReport {
    fn new(results: Vec<AttendanceSubmissionResult>, applied: AppliedResults) -> Self {
        Self {
            results,
            rejections: applied.rejections,
            superseded: applied.superseded,
            applied: applied.applied,
        }
    }

    /// 實際套用到點名表、已清除 dirty 的確認數
    pub fn confirmed_count(&self) -> usize {
        self.applied
    }

    pub fn is_complete(&self) -> bool {
        self.rejections.is_empty()
    }

    /// 是否因憑證問題被拒，呼叫端應提示重新登入
    pub fn needs_login(&self) -> bool {
        self.rejections
            .iter()
            .any(|r| r.reason == RejectionReason::Unauthorized)
    }
}

/// 將點名表的 dirty 項目整批送出一次，並把結果對帳回點名表。
/// 不做任何重試；重試策略屬於傳輸層。
pub struct AttendanceSubmitter<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteAttendanceStore + ?Sized> AttendanceSubmitter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn submit(&self, roster: &mut AttendanceRoster) -> SubmissionReport {
        let ticket = SubmissionTicket::capture(roster);
        let results = self.dispatch(&ticket).await;
        let applied = roster.apply_confirmed(&results);
        SubmissionReport::new(results, applied)
    }

    /// 送出快照。永遠回傳每位送出學生各一筆結果，傳輸失敗時全部為 Rejected。
    pub async fn dispatch(&self, ticket: &SubmissionTicket) -> Vec<AttendanceSubmissionResult> {
        if ticket.is_empty() {
            tracing::debug!("Nothing pending for {} on {}", ticket.course_code, ticket.session_date);
            return Vec::new();
        }

        tracing::debug!(
            "Submitting {} attendance marks for {} on {}",
            ticket.marks.len(),
            ticket.course_code,
            ticket.session_date
        );

        match self
            .store
            .submit_attendance(&ticket.course_code, ticket.session_date, &ticket.marks)
            .await
        {
            Ok(outcomes) => match_outcomes(ticket, outcomes),
            Err(AttendanceError::Unauthorized) => {
                tracing::warn!("Attendance submission rejected: credential missing or expired");
                ticket.reject_all(RejectionReason::Unauthorized)
            }
            Err(e) => {
                tracing::warn!("Attendance submission failed, roster left dirty: {}", e);
                ticket.reject_all(RejectionReason::Transport(e.to_string()))
            }
        }
    }
}

/// 逐筆比對伺服器回覆；沒被回覆的學生視為未確認，不當作成功
fn match_outcomes(
    ticket: &SubmissionTicket,
    outcomes: Vec<RemoteEntryOutcome>,
) -> Vec<AttendanceSubmissionResult> {
    let mut by_student: HashMap<String, RemoteOutcome> = HashMap::new();
    for entry in outcomes {
        if !ticket.marks.iter().any(|m| m.student_id == entry.student_id) {
            tracing::warn!("Server acknowledged unsubmitted student {}", entry.student_id);
            continue;
        }
        by_student.entry(entry.student_id).or_insert(entry.outcome);
    }

    ticket
        .marks
        .iter()
        .map(|mark| {
            let outcome = match by_student.remove(&mark.student_id) {
                Some(RemoteOutcome::Confirmed(AttendanceStatus::Unmarked)) => {
                    SubmissionOutcome::Rejected(RejectionReason::Server(
                        "confirmation carried no status".to_string(),
                    ))
                }
                Some(RemoteOutcome::Confirmed(status)) => SubmissionOutcome::Confirmed(status),
                Some(RemoteOutcome::Rejected(message)) => {
                    SubmissionOutcome::Rejected(RejectionReason::Server(message))
                }
                None => SubmissionOutcome::Rejected(RejectionReason::NoAcknowledgment),
            };
            AttendanceSubmissionResult {
                student_id: mark.student_id.clone(),
                sent: mark.status,
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{date, students, MockStore, SubmitReply};
    use AttendanceStatus::*;

    fn roster(ids: &[&str]) -> AttendanceRoster {
        AttendanceRoster::load("ACU2212", date("2025-03-10"), students(ids))
    }

    fn outcome(id: &str, outcome: RemoteOutcome) -> RemoteEntryOutcome {
        RemoteEntryOutcome {
            student_id: id.to_string(),
            outcome,
        }
    }

    #[tokio::test]
    async fn test_only_dirty_marked_entries_sent() {
        let store = MockStore::default();
        let mut roster = roster(&["A", "B", "C"]);
        roster.set_status("A", Present).unwrap();
        roster.set_status("C", Late).unwrap();

        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;

        let sent = store.submitted().await;
        assert_eq!(sent.len(), 1);
        let ids: Vec<_> = sent[0].iter().map(|m| m.student_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(report.confirmed_count(), 2);
        assert!(report.is_complete());
        assert_eq!(roster.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_pending_makes_no_call() {
        let store = MockStore::default();
        let mut roster = roster(&["A"]);
        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;
        assert!(report.results.is_empty());
        assert!(store.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_everything_and_keeps_dirty() {
        let store = MockStore {
            submit_reply: SubmitReply::Fail,
            ..Default::default()
        };
        let mut roster = roster(&["S1", "S2"]);
        roster.set_status("S1", Present).unwrap();
        roster.set_status("S2", Late).unwrap();

        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;

        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| matches!(
            r.outcome,
            SubmissionOutcome::Rejected(RejectionReason::Transport(_))
        )));
        assert_eq!(report.rejections.len(), 2);
        assert!(roster.entry("S1").unwrap().is_dirty());
        assert!(roster.entry("S2").unwrap().is_dirty());
        assert_eq!(roster.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_flags_login() {
        let store = MockStore {
            unauthorized: true,
            ..Default::default()
        };
        let mut roster = roster(&["S1"]);
        roster.set_status("S1", Absent).unwrap();

        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;
        assert!(report.needs_login());
        assert!(roster.entry("S1").unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_missing_acknowledgment_is_rejection() {
        let store = MockStore {
            submit_reply: SubmitReply::Fixed(vec![
                outcome("A", RemoteOutcome::Confirmed(Present)),
                outcome("Z", RemoteOutcome::Confirmed(Late)),
            ]),
            ..Default::default()
        };
        let mut roster = roster(&["A", "B"]);
        roster.set_status("A", Present).unwrap();
        roster.set_status("B", Absent).unwrap();

        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(
            report.rejections,
            vec![Rejection {
                student_id: "B".into(),
                reason: RejectionReason::NoAcknowledgment,
            }]
        );
        assert!(!roster.entry("A").unwrap().is_dirty());
        assert!(roster.entry("B").unwrap().is_dirty());
        assert_eq!(
            report.rejections[0].reason.to_string(),
            "no server acknowledgment"
        );
    }

    #[tokio::test]
    async fn test_partial_rejection_keeps_rest_of_batch() {
        let store = MockStore {
            submit_reply: SubmitReply::Fixed(vec![
                outcome("A", RemoteOutcome::Rejected("not enrolled".into())),
                outcome("B", RemoteOutcome::Confirmed(Absent)),
                outcome("B", RemoteOutcome::Rejected("duplicate row".into())),
            ]),
            ..Default::default()
        };
        let mut roster = roster(&["A", "B"]);
        roster.set_status("A", Late).unwrap();
        roster.set_status("B", Absent).unwrap();

        let report = AttendanceSubmitter::new(&store).submit(&mut roster).await;

        assert_eq!(report.confirmed_count(), 1);
        assert_eq!(report.rejections[0].student_id, "A");
        assert_eq!(roster.entry("A").unwrap().status(), Late);
        assert!(!roster.entry("B").unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_edit_during_flight_survives_stale_confirmation() {
        let store = MockStore::default();
        let mut roster = roster(&["A", "B"]);
        roster.set_status("A", Present).unwrap();

        let submitter = AttendanceSubmitter::new(&store);
        let ticket = SubmissionTicket::capture(&roster);
        let results = submitter.dispatch(&ticket).await;

        // 回應抵達前使用者又改了 A
        roster.set_status("A", Absent).unwrap();

        let report = ticket.reconcile(&mut roster, results).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.confirmed_count(), 0);
        assert_eq!(report.superseded, vec!["A".to_string()]);

        let entry = roster.entry("A").unwrap();
        assert_eq!(entry.status(), Absent);
        assert!(entry.is_dirty());
        assert_eq!(roster.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_edits_after_snapshot_not_sent() {
        let store = MockStore::default();
        let mut roster = roster(&["A", "B"]);
        roster.set_status("A", Present).unwrap();

        let ticket = SubmissionTicket::capture(&roster);
        roster.set_status("B", Late).unwrap();
        let results = AttendanceSubmitter::new(&store).dispatch(&ticket).await;
        ticket.reconcile(&mut roster, results).unwrap();

        assert_eq!(store.submitted().await[0].len(), 1);
        assert!(roster.entry("B").unwrap().is_dirty());
        assert!(!roster.entry("A").unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_response_for_replaced_roster_is_discarded() {
        let store = MockStore::default();
        let mut old = roster(&["A"]);
        old.set_status("A", Present).unwrap();
        let ticket = SubmissionTicket::capture(&old);
        let results = AttendanceSubmitter::new(&store).dispatch(&ticket).await;

        let mut replacement = roster(&["A"]);
        replacement.set_status("A", Late).unwrap();

        let err = ticket.reconcile(&mut replacement, results).unwrap_err();
        assert!(matches!(err, AttendanceError::StaleSubmission { .. }));
        assert!(replacement.entry("A").unwrap().is_dirty());
        assert_eq!(replacement.entry("A").unwrap().status(), Late);
    }
}
