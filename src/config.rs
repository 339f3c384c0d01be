use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the token service, without a trailing slash.
    pub base_url: String,
    /// Admin credential sent verbatim in the Authorization header.
    /// Set via TOKENCTL_ADMIN_TOKEN.
    pub admin_token: String,
    /// Total request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
    /// Connect timeout in seconds. Default: 5.
    pub connect_timeout_secs: u64,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let base_url =
        std::env::var("TOKENCTL_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".into());
    url::Url::parse(&base_url)
        .with_context(|| format!("TOKENCTL_BASE_URL is not a valid URL: {}", base_url))?;

    let admin_token = std::env::var("TOKENCTL_ADMIN_TOKEN").unwrap_or_default();
    if admin_token.is_empty() {
        anyhow::bail!(
            "TOKENCTL_ADMIN_TOKEN is not set. \
             Every token-service call is authenticated; export the admin credential first."
        );
    }

    Ok(Config {
        base_url: base_url.trim_end_matches('/').to_string(),
        admin_token,
        timeout_secs: std::env::var("TOKENCTL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        connect_timeout_secs: std::env::var("TOKENCTL_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
    })
}
