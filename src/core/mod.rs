pub mod enrollment;
pub mod parser;
pub mod roster;
pub mod session;
pub mod submitter;
pub mod summary;

pub use crate::domain::model::*;
pub use crate::domain::ports::{CredentialProvider, RemoteAttendanceStore};
pub use crate::utils::error::Result;
