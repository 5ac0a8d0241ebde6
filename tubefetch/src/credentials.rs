//! Ordered authentication contexts for engine invocations.
//!
//! Each request tries, in order: the deployment's cookie file, cookies read
//! from local browser profiles, spoofed browser headers, and finally a bare
//! invocation. The first successful attempt wins. A browser whose cookie
//! database is locked is a soft failure; when every browser was locked and
//! an anonymous fallback then hits a sign-in wall, the chain stops with an
//! error telling the user to close the browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use yt_dlp::{CommandBuilder, ProcessOutcome, ProcessRunner};

use crate::config::Config;
use crate::error::FetchError;
use crate::job::{discard_file, discard_file_blocking};

const SPOOF_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const SPOOF_REFERER: &str = "https://www.youtube.com/";
const SPOOF_ACCEPT_LANGUAGE: &str = "Accept-Language:en-US,en;q=0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserSource {
    Chrome,
    Edge,
    Firefox,
    Brave,
    Opera,
    Vivaldi
}

impl BrowserSource {
    /// Default preference order.
    pub const ALL: [BrowserSource; 6] = [
        BrowserSource::Chrome,
        BrowserSource::Edge,
        BrowserSource::Firefox,
        BrowserSource::Brave,
        BrowserSource::Opera,
        BrowserSource::Vivaldi
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BrowserSource::Chrome => "chrome",
            BrowserSource::Edge => "edge",
            BrowserSource::Firefox => "firefox",
            BrowserSource::Brave => "brave",
            BrowserSource::Opera => "opera",
            BrowserSource::Vivaldi => "vivaldi"
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|browser| browser.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Comma separated names; unknown names are skipped with a warning.
    pub fn parse_list(list: &str) -> Vec<Self> {
        let mut browsers = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match Self::parse(name) {
                Some(browser) if !browsers.contains(&browser) => browsers.push(browser),
                Some(_) => {}
                None => tracing::warn!("Ignoring unknown cookie browser: {}", name)
            }
        }
        browsers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    ExplicitFile(PathBuf),
    NamedLocalSource(BrowserSource),
    SpoofedHeaders,
    None
}

impl CredentialStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStrategy::ExplicitFile(_) => "cookies-file",
            CredentialStrategy::NamedLocalSource(browser) => browser.as_str(),
            CredentialStrategy::SpoofedHeaders => "spoofed-headers",
            CredentialStrategy::None => "none"
        }
    }

    fn is_local_source(&self) -> bool {
        matches!(self, CredentialStrategy::NamedLocalSource(_))
    }

    fn is_fallback(&self) -> bool {
        matches!(self, CredentialStrategy::SpoofedHeaders | CredentialStrategy::None)
    }

    fn apply(&self, builder: CommandBuilder) -> CommandBuilder {
        match self {
            CredentialStrategy::ExplicitFile(path) => builder.cookies_file(path),
            CredentialStrategy::NamedLocalSource(browser) => builder.cookies_from_browser(browser.as_str()),
            CredentialStrategy::SpoofedHeaders => builder
                .user_agent(SPOOF_USER_AGENT)
                .referer(SPOOF_REFERER)
                .add_header(SPOOF_ACCEPT_LANGUAGE),
            CredentialStrategy::None => builder
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialChain {
    cookies_content: Option<String>,
    browsers: Vec<BrowserSource>,
    js_runtime: Option<String>,
    temp_dir: PathBuf
}

impl CredentialChain {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cookies_content: config.cookies_content.clone(),
            browsers: config.cookie_browsers.clone(),
            js_runtime: config.js_runtime.clone(),
            temp_dir: config.temp_dir.clone()
        }
    }

    pub fn strategies(&self, cookie_file: Option<&Path>) -> Vec<CredentialStrategy> {
        cookie_file
            .map(|path| CredentialStrategy::ExplicitFile(path.to_path_buf()))
            .into_iter()
            .chain(self.browsers.iter().copied().map(CredentialStrategy::NamedLocalSource))
            .chain([CredentialStrategy::SpoofedHeaders, CredentialStrategy::None])
            .collect()
    }

    /// Runs `base` under each strategy until one succeeds and returns that
    /// attempt's stdout. The cookie file, if any, exists only for the
    /// duration of this call.
    pub async fn run(
        &self,
        runner: &dyn ProcessRunner,
        base: &CommandBuilder,
        limit: Duration
    ) -> Result<String, FetchError> {
        let cookie_file = match self.cookies_content {
            Some(ref content) => match CookieFile::create(&self.temp_dir, content).await {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!("Failed to write cookies from environment: {}", e);
                    None
                }
            },
            None => None
        };

        let strategies = self.strategies(cookie_file.as_ref().map(CookieFile::path));
        let result = run_strategies(runner, base, &strategies, self.js_runtime.as_deref(), limit).await;

        if let Some(file) = cookie_file {
            file.remove().await;
        }

        result
    }
}

async fn run_strategies(
    runner: &dyn ProcessRunner,
    base: &CommandBuilder,
    strategies: &[CredentialStrategy],
    js_runtime: Option<&str>,
    limit: Duration
) -> Result<String, FetchError> {
    let mut last_error: Option<String> = None;
    let mut local_attempts = 0usize;
    let mut local_locked = 0usize;

    for strategy in strategies {
        let label = strategy.label();
        let mut builder = strategy.apply(base.clone());
        if let Some(runtime) = js_runtime {
            builder = builder.js_runtimes(runtime);
        }

        tracing::info!(strategy = label, "running yt-dlp");
        let message = match runner.run(builder.into_args(), limit, label).await {
            ProcessOutcome::Success { stdout } => {
                tracing::info!(strategy = label, "yt-dlp succeeded");
                return Ok(stdout);
            }
            ProcessOutcome::TimedOut(limit) => {
                tracing::warn!(strategy = label, "yt-dlp timed out, giving up");
                return Err(FetchError::Timeout(limit));
            }
            failure => failure.message()
        };

        if strategy.is_local_source() && is_missing_profile(&message) {
            tracing::info!(strategy = label, "browser profile not found, trying next strategy");
            last_error = Some(message);
            continue;
        }

        if strategy.is_local_source() {
            local_attempts += 1;
        }

        if is_lock_error(&message) {
            if strategy.is_local_source() {
                local_locked += 1;
            }
            tracing::warn!(strategy = label, "cookie database is locked, trying next strategy");
            last_error = Some(message);
            continue;
        }

        if strategy.is_fallback()
            && is_auth_wall(&message)
            && local_attempts > 0
            && local_locked == local_attempts
        {
            tracing::warn!(strategy = label, "anonymous access blocked while browser cookies are locked");
            return Err(FetchError::CredentialsLocked);
        }

        tracing::warn!(strategy = label, "strategy failed: {}", excerpt(&message));
        last_error = Some(message);
    }

    Err(match last_error {
        Some(message) => FetchError::from_engine_message(message),
        None => FetchError::Engine("no credential strategy was attempted".to_string())
    })
}

fn is_lock_error(message: &str) -> bool {
    message.contains("Could not copy") || message.contains("cookie database")
}

/// yt-dlp's wording for a browser that is not installed.
fn is_missing_profile(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("could not find") && lower.contains("cookies database")
}

fn is_auth_wall(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("sign in") || lower.contains("not a bot") || lower.contains("automated")
}

fn excerpt(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    match first_line.char_indices().nth(120) {
        Some((idx, _)) => format!("{}...", &first_line[..idx]),
        None => first_line.to_string()
    }
}

/// Deployment cookies materialized for one chain run. Removed explicitly
/// when the run ends, or on drop if the request future is cancelled first.
struct CookieFile {
    path: PathBuf,
    removed: bool
}

impl CookieFile {
    async fn create(dir: &Path, content: &str) -> std::io::Result<Self> {
        let file = Self {
            path: dir.join(format!("yt-cookies-{}.txt", uuid7::uuid7())),
            removed: false
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut handle = options.open(&file.path).await?;
        handle.write_all(content.as_bytes()).await?;
        handle.flush().await?;

        Ok(file)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) {
        self.removed = true;
        discard_file(&self.path).await;
    }
}

impl Drop for CookieFile {
    fn drop(&mut self) {
        if !self.removed {
            discard_file_blocking(&self.path);
        }
    }
}
