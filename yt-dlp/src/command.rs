use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

/// Prefix of every line printed through [`PROGRESS_TEMPLATE`]. yt-dlp
/// consumes the leading `download:` as the template type, so the marker
/// has to live in the template body.
pub const PROGRESS_MARKER: &str = "[progress]";

/// Progress lines in a fixed, parseable layout.
pub const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress._percent_str)s %(progress._total_bytes_str)s %(progress._speed_str)s %(progress._eta_str)s";

/// Accumulates yt-dlp arguments. The binary is chosen by the runner.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    args: Vec<String>
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn url(self, url: impl Into<String>) -> Self {
        self.arg(url)
    }

    pub fn json_output(self) -> Self {
        self.arg("--dump-json")
    }

    pub fn no_playlist(self) -> Self {
        self.arg("--no-playlist")
    }

    pub fn no_warnings(self) -> Self {
        self.arg("--no-warnings")
    }

    pub fn output(self, path: impl AsRef<Path>) -> Self {
        self.arg("-o").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.arg("-f").arg(format)
    }

    pub fn merge_output_format(self, format: impl Into<String>) -> Self {
        self.arg("--merge-output-format").arg(format)
    }

    pub fn extract_audio(self) -> Self {
        self.arg("-x")
    }

    pub fn audio_format(self, format: impl Into<String>) -> Self {
        self.arg("--audio-format").arg(format)
    }

    pub fn audio_quality(self, quality: impl Into<String>) -> Self {
        self.arg("--audio-quality").arg(quality)
    }

    pub fn cookies_file(self, path: impl AsRef<Path>) -> Self {
        self.arg("--cookies").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn cookies_from_browser(self, browser: impl Into<String>) -> Self {
        self.arg("--cookies-from-browser").arg(browser)
    }

    pub fn user_agent(self, agent: impl Into<String>) -> Self {
        self.arg("--user-agent").arg(agent)
    }

    pub fn referer(self, referer: impl Into<String>) -> Self {
        self.arg("--referer").arg(referer)
    }

    pub fn add_header(self, header: impl Into<String>) -> Self {
        self.arg("--add-header").arg(header)
    }

    pub fn js_runtimes(self, runtime: impl Into<String>) -> Self {
        self.arg("--js-runtimes").arg(runtime)
    }

    pub fn ffmpeg_location(self, path: impl AsRef<Path>) -> Self {
        self.arg("--ffmpeg-location").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn newline_progress(self) -> Self {
        self.arg("--newline")
    }

    pub fn progress_template(self, template: impl Into<String>) -> Self {
        self.arg("--progress-template").arg(template)
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

/// Prepares the process for `binary`. `PATH_PREPEND` is joined in front of
/// the inherited `PATH`; every other entry is set verbatim.
pub(crate) fn build_command(
    binary: &Path,
    args: &[String],
    env_vars: &HashMap<String, String>
) -> Command {
    let mut cmd = Command::new(binary);
    cmd.args(args);

    if let Some(path_prepend) = env_vars.get("PATH_PREPEND") {
        let current_path = std::env::var("PATH").unwrap_or_default();
        cmd.env("PATH", format!("{path_prepend}:{current_path}"));
    }

    for (key, value) in env_vars {
        if key != "PATH_PREPEND" {
            cmd.env(key, value);
        }
    }

    cmd
}
