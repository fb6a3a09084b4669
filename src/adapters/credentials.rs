use crate::domain::ports::CredentialProvider;

/// 固定的 token，或明確表示沒有憑證
#[derive(Debug, Clone, Default)]
pub struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    pub fn none() -> Self {
        Self { token: None }
    }
}

impl CredentialProvider for StaticCredential {
    fn bearer(&self) -> Option<String> {
        self.token.clone()
    }
}

/// 每次呼叫都重新讀取環境變數，外部登入流程更新 token 後立即生效
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl CredentialProvider for EnvCredential {
    fn bearer(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

/// 由設定決定的憑證來源
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(StaticCredential),
    Env(EnvCredential),
}

impl CredentialProvider for CredentialSource {
    fn bearer(&self) -> Option<String> {
        match self {
            Self::Static(credential) => credential.bearer(),
            Self::Env(credential) => credential.bearer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credential() {
        assert_eq!(StaticCredential::new("abc").bearer().as_deref(), Some("abc"));
        assert_eq!(StaticCredential::new("  ").bearer(), None);
        assert_eq!(StaticCredential::none().bearer(), None);
    }

    #[test]
    fn test_env_credential_reads_on_each_call() {
        let credential = EnvCredential::new("ROLLCALL_TEST_TOKEN_ROTATION");
        std::env::remove_var(credential.var());
        assert_eq!(credential.bearer(), None);

        std::env::set_var(credential.var(), "first");
        assert_eq!(credential.bearer().as_deref(), Some("first"));

        std::env::set_var(credential.var(), "second");
        assert_eq!(credential.bearer().as_deref(), Some("second"));

        std::env::remove_var(credential.var());
    }
}
