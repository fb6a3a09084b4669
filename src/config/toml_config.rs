use crate::adapters::credentials::{CredentialSource, EnvCredential, StaticCredential};
use crate::core::parser::DEFAULT_COLUMNS;
use crate::utils::error::{AttendanceError, Result};
use crate::utils::validation::{
    validate_env_var_name, validate_non_empty_string, validate_positive_number, validate_url,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TOKEN_ENV: &str = "ROLLCALL_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub auth: Option<AuthConfig>,
    pub enrollment: Option<EnrollmentConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    pub expected_columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl ClientConfig {
    /// 只有伺服器位址的最小設定
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                base_url: base_url.into(),
                timeout_seconds: None,
            },
            auth: None,
            enrollment: None,
            logging: None,
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AttendanceError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ROLLCALL_TOKEN})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| AttendanceError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn base_url(&self) -> &str {
        &self.server.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.server.timeout_seconds.map(Duration::from_secs)
    }

    pub fn expected_columns(&self) -> Vec<String> {
        self.enrollment
            .as_ref()
            .and_then(|e| e.expected_columns.clone())
            .unwrap_or_else(|| DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn token_env(&self) -> &str {
        self.auth
            .as_ref()
            .and_then(|a| a.token_env.as_deref())
            .unwrap_or(DEFAULT_TOKEN_ENV)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// 設定檔中明確給的 token 優先；未替換的 `${...}` 視為沒有設定
    pub fn credentials(&self) -> CredentialSource {
        let inline = self
            .auth
            .as_ref()
            .and_then(|a| a.token.as_deref())
            .filter(|t| !t.trim().is_empty() && !t.starts_with("${"));

        match inline {
            Some(token) => CredentialSource::Static(StaticCredential::new(token)),
            None => CredentialSource::Env(EnvCredential::new(self.token_env())),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("server.base_url", &self.server.base_url)?;

        if let Some(timeout) = self.server.timeout_seconds {
            validate_positive_number("server.timeout_seconds", timeout, 1)?;
        }

        validate_env_var_name("auth.token_env", self.token_env())?;

        let columns = self.expected_columns();
        for column in &columns {
            validate_non_empty_string("enrollment.expected_columns", column)?;
        }
        crate::core::parser::RecordParser::new(&columns)?;

        if let Some(level) = self.log_level() {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(AttendanceError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
