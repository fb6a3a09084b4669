use crate::domain::model::{CourseAttendanceSummary, EnrollmentOutcome, EnrollmentReport};
use crate::utils::error::Result;
use std::io::Write;

/// 每筆選課結果輸出成 CSV：line,registration_number,course_code,outcome,reason
pub fn write_enrollment_report<W: Write>(report: &EnrollmentReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["line", "registration_number", "course_code", "outcome", "reason"])?;

    for item in &report.outcomes {
        let (registration, course) = item
            .record
            .as_ref()
            .map(|r| (r.registration_number(), r.course_code()))
            .unwrap_or(("", ""));
        let reason = match &item.outcome {
            EnrollmentOutcome::Malformed(reason) => reason.as_str(),
            _ => "",
        };
        csv.write_record([
            item.line_number.to_string().as_str(),
            registration,
            course,
            item.outcome.label(),
            reason,
        ])?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_summaries<W: Write>(summaries: &[CourseAttendanceSummary], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "course_code",
        "course_name",
        "total_sessions",
        "present",
        "absent",
        "late",
        "presence_ratio",
    ])?;

    for summary in summaries {
        let ratio = summary
            .presence_ratio()
            .map(|r| format!("{:.3}", r))
            .unwrap_or_default();
        csv.write_record([
            summary.course_code.as_str(),
            summary.course_name.as_str(),
            summary.total_sessions.to_string().as_str(),
            summary.present_count.to_string().as_str(),
            summary.absent_count.to_string().as_str(),
            summary.late_count.to_string().as_str(),
            ratio.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
