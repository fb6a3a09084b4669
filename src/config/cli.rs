use crate::config::toml_config::{AuthConfig, ClientConfig};
use crate::domain::model::AttendanceStatus;
use crate::utils::error::{AttendanceError, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "rollcall")]
#[command(about = "Bulk enrollment and attendance recording client")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides server.base_url)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Environment variable holding the bearer token (overrides auth.token_env)
    #[arg(long, global = true)]
    pub token_env: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Bulk-enroll students from a tab-separated file
    Enroll {
        file: PathBuf,

        /// Write per-line outcomes to a CSV file
        #[arg(long)]
        report_csv: Option<PathBuf>,

        /// Parse and report without contacting the server
        #[arg(long)]
        dry_run: bool,
    },

    /// List the students enrolled in a course
    Roster { course: String },

    /// Record attendance for one course session
    Record {
        course: String,

        #[arg(long)]
        date: NaiveDate,

        /// STUDENT=STATUS, repeatable (status: present, absent, late)
        #[arg(long = "mark", value_parser = parse_mark)]
        marks: Vec<MarkArg>,

        /// Mark every student on the roster before applying --mark
        #[arg(long)]
        all: Option<AttendanceStatus>,
    },

    /// Show per-course attendance summary for a student
    Summary {
        student: String,

        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show recorded attendance of a course on a date
    ByDate {
        course: String,

        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkArg {
    pub student_id: String,
    pub status: AttendanceStatus,
}

fn parse_mark(value: &str) -> std::result::Result<MarkArg, String> {
    let (student_id, status) = value
        .split_once('=')
        .ok_or_else(|| format!("expected STUDENT=STATUS, got '{}'", value))?;
    let student_id = student_id.trim();
    if student_id.is_empty() {
        return Err("student id cannot be empty".to_string());
    }

    Ok(MarkArg {
        student_id: student_id.to_string(),
        status: status.parse()?,
    })
}

impl CliConfig {
    /// 載入設定檔並套用命令列覆蓋
    pub fn resolve(&self) -> Result<ClientConfig> {
        let mut config = match (&self.config, &self.base_url) {
            (Some(path), _) => ClientConfig::from_file(path)?,
            (None, Some(base_url)) => ClientConfig::with_base_url(base_url.clone()),
            (None, None) => {
                return Err(AttendanceError::MissingConfigError {
                    field: "--config or --base-url".to_string(),
                })
            }
        };

        if let Some(base_url) = &self.base_url {
            config.server.base_url = base_url.clone();
        }
        if let Some(token_env) = &self.token_env {
            config
                .auth
                .get_or_insert_with(AuthConfig::default)
                .token_env = Some(token_env.clone());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_command() {
        let cli = CliConfig::try_parse_from([
            "rollcall",
            "--base-url",
            "http://localhost:8080",
            "record",
            "ACU2212",
            "--date",
            "2025-03-10",
            "--all",
            "present",
            "--mark",
            "2021ICT006=absent",
            "--mark",
            "2021ICT007=L",
        ])
        .unwrap();

        match cli.command {
            Command::Record {
                course,
                date,
                marks,
                all,
            } => {
                assert_eq!(course, "ACU2212");
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
                assert_eq!(all, Some(AttendanceStatus::Present));
                assert_eq!(marks.len(), 2);
                assert_eq!(marks[1].status, AttendanceStatus::Late);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_mark_rejected() {
        assert!(parse_mark("no-equals").is_err());
        assert!(parse_mark("=present").is_err());
        assert!(parse_mark("S1=sleeping").is_err());
    }

    #[test]
    fn test_resolve_requires_server() {
        let cli = CliConfig::try_parse_from(["rollcall", "roster", "ACU2212"]).unwrap();
        assert!(matches!(
            cli.resolve(),
            Err(AttendanceError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let cli = CliConfig::try_parse_from([
            "rollcall",
            "summary",
            "R1",
            "--base-url",
            "http://localhost:9000",
            "--token-env",
            "OTHER_TOKEN",
        ])
        .unwrap();

        let config = cli.resolve().unwrap();
        assert_eq!(config.base_url(), "http://localhost:9000");
        assert_eq!(config.token_env(), "OTHER_TOKEN");
    }
}
