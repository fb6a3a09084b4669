use clap::Parser;
use rollcall::config::Command;
use rollcall::core::summary::session_attendance;
use rollcall::core::EnrollmentOutcome;
use rollcall::utils::error::ErrorSeverity;
use rollcall::utils::{export, logger, validation::Validate};
use rollcall::{
    AttendanceError, CliConfig, ClientConfig, CredentialSource, EnrollmentReconciler,
    HttpAttendanceStore, RecordParser, RecordingSession, RemoteAttendanceStore, SummaryAggregator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.json_logs() {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }

    tracing::info!("Starting rollcall");
    if cli.verbose {
        tracing::debug!("Client config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let mut store = HttpAttendanceStore::new(config.base_url(), config.credentials())?;
    if let Some(timeout) = config.timeout() {
        store = store.with_timeout(timeout);
    }

    if let Err(e) = run(&cli.command, &config, &store).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(
    command: &Command,
    config: &ClientConfig,
    store: &HttpAttendanceStore<CredentialSource>,
) -> rollcall::Result<()> {
    match command {
        Command::Enroll {
            file,
            report_csv,
            dry_run,
        } => {
            let parser = RecordParser::new(&config.expected_columns())?;
            let batch = parser.parse_file(file)?;
            println!(
                "📄 Parsed {} lines ({} malformed)",
                batch.len(),
                batch.malformed_count()
            );
            for record in batch.candidates() {
                println!("  {}\t{}", record.registration_number(), record.course_code());
            }

            if *dry_run {
                tracing::info!("🔍 DRY RUN MODE - nothing was sent");
                return Ok(());
            }

            let report = EnrollmentReconciler::new(store).submit(batch).await?;
            println!(
                "✅ {}",
                report.message.as_deref().unwrap_or("Enrollment completed.")
            );
            println!("Successful enrollments - {}", report.accepted);
            println!(
                "Failed enrollments - {} (Caused by duplicate entries)",
                report.skipped_duplicates
            );
            for item in &report.outcomes {
                if let EnrollmentOutcome::Malformed(reason) = &item.outcome {
                    println!("⚠️  line {}: {}", item.line_number, reason);
                }
            }

            if let Some(path) = report_csv {
                export::write_enrollment_report(&report, std::fs::File::create(path)?)?;
                println!("📁 Report saved to: {}", path.display());
            }
        }

        Command::Roster { course } => {
            let students = store.fetch_roster(course).await?;
            println!("{} students enrolled in {}", students.len(), course);
            for student in students {
                println!("  {}\t{}", student.student_id, student.display_name);
            }
        }

        Command::Record {
            course,
            date,
            marks,
            all,
        } => {
            let mut session = RecordingSession::new(store);
            let roster = session.open(course, *date).await?;

            if let Some(status) = all {
                roster.mark_all(*status);
            }
            for mark in marks {
                roster.set_status(&mark.student_id, mark.status)?;
            }

            let report = session.submit().await?;
            println!("✅ {} attendance marks confirmed", report.confirmed_count());
            if !report.superseded.is_empty() {
                println!(
                    "✏️  {} marks changed while sending, submit again: {}",
                    report.superseded.len(),
                    report.superseded.join(", ")
                );
            }
            for rejection in &report.rejections {
                println!("❌ {}: {}", rejection.student_id, rejection.reason);
            }
            if report.needs_login() {
                return Err(AttendanceError::Unauthorized);
            }
        }

        Command::Summary { student, csv } => {
            let summaries = SummaryAggregator::for_student(store, student).await?;
            if summaries.is_empty() {
                println!("No courses found for {}", student);
            }
            for summary in &summaries {
                let ratio = summary
                    .presence_ratio()
                    .map(|r| format!("{:.1}%", r * 100.0))
                    .unwrap_or_else(|| "no sessions yet".to_string());
                println!(
                    "{} - {}: {} present, {} late, {} absent of {} ({})",
                    summary.course_code,
                    summary.course_name,
                    summary.present_count,
                    summary.late_count,
                    summary.absent_count,
                    summary.total_sessions,
                    ratio
                );
            }

            if let Some(path) = csv {
                export::write_summaries(&summaries, std::fs::File::create(path)?)?;
                println!("📁 Summary saved to: {}", path.display());
            }
        }

        Command::ByDate { course, date } => {
            let records = session_attendance(store, course, *date).await?;
            if records.is_empty() {
                println!("No attendance records found.");
            }
            for record in records {
                println!(
                    "  {}\t{}\t{}",
                    record.registration_number,
                    record.full_name(),
                    record.status
                );
            }
        }
    }

    Ok(())
}
