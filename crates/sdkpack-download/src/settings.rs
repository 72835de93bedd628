use std::time::Duration;

pub const DEFAULT_SSO_HOST: &str = "login.oracle.com";
pub const DEFAULT_CREDENTIAL_URL: &str = "config.toml [credentials]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Only host allowed to serve HTML while the login flow is running.
    pub sso_host: String,
    /// Where users are told to enter an account when one is required.
    pub credential_url: String,
    /// Whole-request bound, body transfer included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            sso_host: DEFAULT_SSO_HOST.to_string(),
            credential_url: DEFAULT_CREDENTIAL_URL.to_string(),
            timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("sdkpack/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
