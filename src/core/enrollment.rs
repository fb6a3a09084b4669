use crate::core::{
    EnrollmentBatch, EnrollmentOutcome, EnrollmentRecord, EnrollmentReport, ParsedEntry,
    RecordOutcome, RemoteAttendanceStore,
};
use crate::domain::model::BulkEnrollResponse;
use crate::utils::error::Result;
use std::collections::HashMap;

/// 將一整批選課紀錄送出並彙整結果。
///
/// 重複判定完全由遠端決定，本地不做任何去重。傳輸失敗時整批視為失敗，
/// 直接回傳錯誤而非部分報告。
pub struct EnrollmentReconciler<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteAttendanceStore + ?Sized> EnrollmentReconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn submit(&self, batch: EnrollmentBatch) -> Result<EnrollmentReport> {
        let malformed = batch.malformed_count();
        let candidates: Vec<EnrollmentRecord> = batch.candidates().cloned().collect();

        if candidates.is_empty() {
            tracing::info!(
                "No well-formed enrollment records ({} malformed), sending empty batch",
                malformed
            );
        } else {
            tracing::debug!("Submitting {} enrollment records", candidates.len());
        }
        let response = match self.store.bulk_enroll(&candidates).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Bulk enrollment failed, nothing was recorded: {}", e);
                return Err(e);
            }
        };

        if response.accepted + response.skipped_duplicates != candidates.len() {
            tracing::warn!(
                "Server counts ({} accepted, {} duplicates) do not cover {} submitted records",
                response.accepted,
                response.skipped_duplicates,
                candidates.len()
            );
        }

        let classified = classify(&candidates, &response);
        let report = build_report(batch, &response, classified);

        tracing::info!(
            "Enrollment finished: {} accepted, {} duplicates skipped, {} malformed",
            report.accepted,
            report.skipped_duplicates,
            report.malformed
        );
        Ok(report)
    }
}

/// 依伺服器回覆決定每筆已送出紀錄的結果
fn classify(candidates: &[EnrollmentRecord], response: &BulkEnrollResponse) -> Vec<EnrollmentOutcome> {
    if let Some(duplicates) = &response.duplicates {
        let mut remaining: HashMap<(&str, &str), usize> = HashMap::new();
        for record in duplicates {
            *remaining.entry(record.key()).or_default() += 1;
        }

        // 同批內重複時，先出現的那筆才是被接受的，因此從後往前配對
        let mut outcomes: Vec<EnrollmentOutcome> = candidates
            .iter()
            .rev()
            .map(|record| match remaining.get_mut(&record.key()) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    EnrollmentOutcome::DuplicateSkipped
                }
                _ => EnrollmentOutcome::Accepted,
            })
            .collect();
        outcomes.reverse();
        return outcomes;
    }

    let uniform = if response.skipped_duplicates == 0 {
        EnrollmentOutcome::Accepted
    } else if response.accepted == 0 {
        EnrollmentOutcome::DuplicateSkipped
    } else {
        EnrollmentOutcome::Submitted
    };
    vec![uniform; candidates.len()]
}

fn build_report(
    batch: EnrollmentBatch,
    response: &BulkEnrollResponse,
    classified: Vec<EnrollmentOutcome>,
) -> EnrollmentReport {
    let malformed = batch.malformed_count();
    let mut classified = classified.into_iter();

    let outcomes = batch
        .into_lines()
        .into_iter()
        .map(|line| match line.entry {
            ParsedEntry::Candidate(record) => RecordOutcome {
                line_number: line.line_number,
                record: Some(record),
                outcome: classified.next().unwrap_or(EnrollmentOutcome::Submitted),
            },
            ParsedEntry::Malformed { reason, .. } => RecordOutcome {
                line_number: line.line_number,
                record: None,
                outcome: EnrollmentOutcome::Malformed(reason),
            },
        })
        .collect();

    EnrollmentReport {
        accepted: response.accepted,
        skipped_duplicates: response.skipped_duplicates,
        malformed,
        message: response.message.clone(),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::RecordParser;
    use crate::core::testing::MockStore;
    use crate::utils::error::AttendanceError;
    use tokio_test::{assert_err, assert_ok};

    fn batch(raw: &str) -> EnrollmentBatch {
        RecordParser::default().parse(raw).unwrap()
    }

    fn labels(report: &EnrollmentReport) -> Vec<&'static str> {
        report.outcomes.iter().map(|o| o.outcome.label()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_within_batch_counts_from_server() {
        let store = MockStore {
            enroll_reply: Some(BulkEnrollResponse {
                accepted: 1,
                skipped_duplicates: 1,
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\nR1\tC1\n"))
            .await
            .unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(report.malformed, 0);
        // 兩筆都原封不動送出，去重交給伺服器
        assert_eq!(store.enroll_calls.lock().await[0].len(), 2);
        assert_eq!(labels(&report), vec!["submitted", "submitted"]);
    }

    #[tokio::test]
    async fn test_itemized_duplicates_classified_per_record() {
        let dup = EnrollmentRecord::new("R1", "C1").unwrap();
        let store = MockStore {
            enroll_reply: Some(BulkEnrollResponse {
                accepted: 2,
                skipped_duplicates: 1,
                message: Some("Enrollment completed.".into()),
                duplicates: Some(vec![dup]),
            }),
            ..Default::default()
        };

        let report = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\nR2\tC1\nR1\tC1\n"))
            .await
            .unwrap();

        assert_eq!(
            labels(&report),
            vec!["accepted", "accepted", "duplicate_skipped"]
        );
        assert_eq!(report.message.as_deref(), Some("Enrollment completed."));
    }

    #[tokio::test]
    async fn test_malformed_lines_counted_but_not_sent() {
        let store = MockStore {
            enroll_reply: Some(BulkEnrollResponse {
                accepted: 2,
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\nbroken\nR2\tC2\n"))
            .await
            .unwrap();

        assert_eq!(report.accepted, 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(labels(&report), vec!["accepted", "malformed", "accepted"]);
        assert_eq!(report.outcomes[1].line_number, 3);

        let sent = store.enroll_calls.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_all_or_nothing() {
        let store = MockStore::default();
        let result = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\n"))
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, AttendanceError::HttpStatus { status: 503, .. }));
        assert_eq!(store.enroll_call_count().await, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_surfaces_distinctly() {
        let store = MockStore {
            unauthorized: true,
            enroll_reply: Some(BulkEnrollResponse::default()),
            ..Default::default()
        };
        let result = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\n"))
            .await;
        assert!(matches!(result, Err(AttendanceError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_all_malformed_still_sends_one_empty_batch() {
        let store = MockStore {
            enroll_reply: Some(BulkEnrollResponse::default()),
            ..Default::default()
        };
        let report = assert_ok!(
            EnrollmentReconciler::new(&store)
                .submit(batch("reg\tcourse\nbad-line\n"))
                .await
        );

        assert_eq!(report.accepted, 0);
        assert_eq!(report.malformed, 1);
        assert_eq!(labels(&report), vec!["malformed"]);
        let sent = store.enroll_calls.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_empty());
    }

    #[tokio::test]
    async fn test_all_duplicates_reported_uniformly() {
        let store = MockStore {
            enroll_reply: Some(BulkEnrollResponse {
                accepted: 0,
                skipped_duplicates: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = EnrollmentReconciler::new(&store)
            .submit(batch("reg\tcourse\nR1\tC1\nR2\tC1\n"))
            .await
            .unwrap();
        assert_eq!(labels(&report), vec!["duplicate_skipped", "duplicate_skipped"]);
    }
}
