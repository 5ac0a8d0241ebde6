use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::BrowserSource;

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub production: bool,
    pub static_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,
    pub js_runtime: Option<String>,
    /// Netscape cookie file content supplied by the deployment.
    pub cookies_content: Option<String>,
    pub cookie_browsers: Vec<BrowserSource>,
    pub temp_dir: PathBuf,
    pub info_timeout: Duration,
    pub download_timeout: Duration,
    pub strict_output_resolution: bool,
    /// Exact origins allowed in addition to localhost and private networks.
    pub cors_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cookie_browsers = match lookup("COOKIE_BROWSERS") {
            Some(list) => BrowserSource::parse_list(&list),
            None => BrowserSource::ALL.to_vec()
        };

        let cors_origins = ["CORS_ORIGIN", "RENDER_EXTERNAL_URL"]
            .iter()
            .filter_map(|&key| get(key))
            .collect();

        Self {
            port: parse_or(get("PORT"), "PORT", 5000),
            production: get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
            static_dir: get("STATIC_DIR").map_or_else(|| PathBuf::from("../frontend/dist"), PathBuf::from),
            ytdlp_path: get("YTDLP_PATH").map_or_else(|| PathBuf::from("yt-dlp"), PathBuf::from),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            js_runtime: match lookup("YTDLP_JS_RUNTIME") {
                Some(runtime) => Some(runtime.trim().to_string()).filter(|r| !r.is_empty()),
                None => Some("node".to_string())
            },
            cookies_content: lookup("COOKIES_TXT_CONTENT")
                .map(|content| normalize_cookie_content(&content))
                .filter(|content| !content.trim().is_empty()),
            cookie_browsers,
            temp_dir: get("TEMP_DIR").map_or_else(std::env::temp_dir, PathBuf::from),
            info_timeout: Duration::from_secs(parse_or(get("INFO_TIMEOUT_SECS"), "INFO_TIMEOUT_SECS", 120)),
            download_timeout: Duration::from_secs(parse_or(
                get("DOWNLOAD_TIMEOUT_SECS"),
                "DOWNLOAD_TIMEOUT_SECS",
                1800
            )),
            strict_output_resolution: get("STRICT_OUTPUT_RESOLUTION")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            cors_origins,
            rate_limit_window: Duration::from_secs(
                parse_or(get("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW", 15u64) * 60
            ),
            rate_limit_max: parse_or(get("RATE_LIMIT_MAX"), "RATE_LIMIT_MAX", 100)
        }
    }
}

/// Dashboards often store multi-line secrets with literal `\n` sequences.
fn normalize_cookie_content(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy
{
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default
    }
}
