use std::path::PathBuf;
use std::time::Duration;

use crate::ports::token::TokenSource;

/// Token handed over once, e.g. from `SPOTIFY_ACCESS_TOKEN`.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|token| !token.trim().is_empty()))
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token kept in a file that an external helper rewrites on refresh.
/// The file is read again on every request.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenSource for TokenFile {
    fn access_token(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// Blocks until `source` reports a usable token, checking every `interval`.
pub async fn wait_for_token(source: &dyn TokenSource, interval: Duration) {
    let mut polls: u64 = 0;
    while !source.has_valid_token() {
        if polls % 50 == 0 {
            tracing::info!(
                every = %humantime::format_duration(interval),
                "Waiting for an access token"
            );
        }
        polls += 1;
        tokio::time::sleep(interval).await;
    }
    if polls > 0 {
        tracing::debug!(polls, "Access token available");
    }
}
