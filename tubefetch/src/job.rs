use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use yt_dlp::{CommandBuilder, PROGRESS_TEMPLATE};

use crate::error::FetchError;
use crate::format::{apply_selection, MediaKind, Quality};
use crate::resolver::resolve_output;

/// Best-effort delete. A file that is already gone counts as removed.
pub async fn discard_file(path: &Path) -> bool {
    report_removal(path, tokio::fs::remove_file(path).await)
}

/// [`discard_file`] for `Drop` impls and other sync cleanup paths.
pub fn discard_file_blocking(path: &Path) -> bool {
    report_removal(path, std::fs::remove_file(path))
}

fn report_removal(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            tracing::debug!("removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// One download request's files in the temp directory.
///
/// Every artifact is named `<base>.*` with a random base, so concurrent jobs
/// never collide. Dropping the job removes all of them unless the resolved
/// output was handed to the streamer.
#[derive(Debug)]
pub struct DownloadJob {
    pub url: String,
    pub kind: MediaKind,
    pub quality: Quality,
    base_name: String,
    temp_dir: PathBuf,
    output: Option<PathBuf>,
    handed_off: bool
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, kind: MediaKind, quality: Quality, temp_dir: impl Into<PathBuf>) -> Self {
        let id = uuid7::uuid7().to_string().replace('-', "");
        Self {
            url: url.into(),
            kind,
            quality,
            base_name: format!("ytdl-{id}"),
            temp_dir: temp_dir.into(),
            output: None,
            handed_off: false
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Download invocation without any credential flags.
    pub fn command(&self, ffmpeg: Option<&Path>) -> CommandBuilder {
        let template = self.temp_dir.join(format!("{}.%(ext)s", self.base_name));
        let builder = apply_selection(CommandBuilder::new().url(&self.url), self.kind, self.quality)
            .output(template)
            .no_playlist()
            .newline_progress()
            .progress_template(PROGRESS_TEMPLATE);

        match ffmpeg {
            Some(path) => builder.ffmpeg_location(path),
            None => builder
        }
    }

    pub async fn resolve(&mut self, strict: bool) -> Result<&Path, FetchError> {
        let path = resolve_output(&self.temp_dir, &self.base_name, self.kind.extension(), strict).await?;
        tracing::info!(base = %self.base_name, "resolved output {}", path.display());
        Ok(self.output.insert(path).as_path())
    }

    /// Releases the resolved file to the caller, which becomes responsible
    /// for deleting it. Every other artifact of the job is removed first.
    pub async fn hand_off(mut self) -> Result<PathBuf, FetchError> {
        let output = self.output.take().ok_or(FetchError::OutputNotFound)?;
        for path in self.artifacts().await {
            if path != output {
                discard_file(&path).await;
            }
        }
        self.handed_off = true;
        Ok(output)
    }

    /// All files carrying the job's base name, `.part` leftovers included.
    async fn artifacts(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.temp_dir).await else {
            return paths;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if self.owns(&entry.file_name().to_string_lossy()) {
                paths.push(entry.path());
            }
        }
        paths
    }

    fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.base_name)
    }
}

impl Drop for DownloadJob {
    fn drop(&mut self) {
        if self.handed_off {
            return;
        }
        let Ok(entries) = std::fs::read_dir(&self.temp_dir) else {
            return;
        };
        for entry in entries.filter_map(Result::ok) {
            if self.owns(&entry.file_name().to_string_lossy()) {
                discard_file_blocking(&entry.path());
            }
        }
    }
}
