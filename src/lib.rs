pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ClientConfig;

pub use adapters::{CredentialSource, EnvCredential, HttpAttendanceStore, StaticCredential};
pub use core::{
    enrollment::EnrollmentReconciler,
    parser::RecordParser,
    roster::AttendanceRoster,
    session::RecordingSession,
    submitter::{AttendanceSubmitter, SubmissionReport, SubmissionTicket},
    summary::SummaryAggregator,
};
pub use domain::ports::{CredentialProvider, RemoteAttendanceStore};
pub use utils::error::{AttendanceError, Result};
