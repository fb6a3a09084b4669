use crate::core::{
    AttendanceStatus, CourseAttendanceSummary, CourseRef, RemoteAttendanceStore,
    SessionAttendanceRecord,
};
use crate::utils::error::Result;
use chrono::NaiveDate;

/// 純函式彙總：計算每門課的出席次數。未標記的紀錄不列入分母。
pub struct SummaryAggregator;

impl SummaryAggregator {
    pub fn aggregate<'a, I>(course: &CourseRef, statuses: I) -> CourseAttendanceSummary
    where
        I: IntoIterator<Item = &'a AttendanceStatus>,
    {
        let mut summary = CourseAttendanceSummary {
            course_code: course.course_code.clone(),
            course_name: course.course_name.clone(),
            total_sessions: 0,
            present_count: 0,
            absent_count: 0,
            late_count: 0,
        };

        for status in statuses {
            match status {
                AttendanceStatus::Present => summary.present_count += 1,
                AttendanceStatus::Absent => summary.absent_count += 1,
                AttendanceStatus::Late => summary.late_count += 1,
                AttendanceStatus::Unmarked => {}
            }
        }
        summary.total_sessions = summary.present_count + summary.absent_count + summary.late_count;
        summary
    }

    /// 取得學生所有課程並逐門彙總
    pub async fn for_student<S: RemoteAttendanceStore + ?Sized>(
        store: &S,
        student_id: &str,
    ) -> Result<Vec<CourseAttendanceSummary>> {
        let courses = store.fetch_student_courses(student_id).await?;
        tracing::debug!("Student {} is enrolled in {} courses", student_id, courses.len());

        let mut summaries = Vec::with_capacity(courses.len());
        for course in &courses {
            let statuses = store
                .fetch_course_attendance(student_id, &course.course_code)
                .await?;
            summaries.push(Self::aggregate(course, &statuses));
        }
        Ok(summaries)
    }
}

/// 依日期查詢某課程出席，依學號排序
pub async fn session_attendance<S: RemoteAttendanceStore + ?Sized>(
    store: &S,
    course_code: &str,
    session_date: NaiveDate,
) -> Result<Vec<SessionAttendanceRecord>> {
    let mut records = store.fetch_session_attendance(course_code, session_date).await?;
    records.sort_by(|a, b| a.registration_number.cmp(&b.registration_number));
    Ok(records)
}
