// Adapters layer: concrete implementations for external systems (http backend, credentials).

pub mod credentials;
pub mod http;

pub use credentials::{CredentialSource, EnvCredential, StaticCredential};
pub use http::HttpAttendanceStore;
