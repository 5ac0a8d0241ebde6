use std::path::PathBuf;
use std::sync::LazyLock;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue
    },
    response::{IntoResponse, Response}
};
use regex::Regex;
use tokio::fs::File;
use tokio_stream::{Stream, StreamExt};
use tokio_util::io::ReaderStream;

use crate::error::FetchError;
use crate::format::MediaKind;
use crate::job::{discard_file, discard_file_blocking};

const MAX_FILENAME_CHARS: usize = 100;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Turns a video title into a header-safe file stem.
pub fn sanitize_filename(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let underscored = WHITESPACE.replace_all(stripped.trim(), "_");
    let cleaned: String = underscored
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_FILENAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// Runs a closure when dropped. `Option::take` makes the call happen at
/// most once no matter how the owner goes away.
struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(finish) = self.0.take() {
            finish();
        }
    }
}

/// Chunks of `file`, calling `on_finish` exactly once when the stream ends,
/// fails, or is dropped unfinished (client disconnect).
pub fn stream_file<F>(file: File, on_finish: F) -> impl Stream<Item = std::io::Result<Bytes>> + Send
where
    F: FnOnce() + Send + 'static
{
    let guard = OnDrop(Some(on_finish));
    async_stream::stream! {
        let _guard = guard;
        let mut chunks = ReaderStream::new(file);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => yield Ok(bytes),
                Err(e) => {
                    tracing::error!("error while streaming download: {}", e);
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

/// Builds the download response for a resolved file. The file is owned by
/// the response from here on and is deleted once the body is done with it.
pub async fn file_response(path: PathBuf, kind: MediaKind, title: &str, inline: bool) -> Result<Response, FetchError> {
    let opened = async {
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        Ok::<_, std::io::Error>((file, len))
    }
    .await;

    let (file, len) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!("failed to open {}: {}", path.display(), e);
            discard_file(&path).await;
            return Err(e.into());
        }
    };

    let filename = format!("{}.{}", sanitize_filename(title), kind.extension());
    let disposition = format!(
        "{}; filename=\"{}\"",
        if inline { "inline" } else { "attachment" },
        filename
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(kind.content_type()));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    tracing::info!(file = %filename, bytes = len, "streaming download");
    let body = Body::from_stream(stream_file(file, move || {
        discard_file_blocking(&path);
    }));

    Ok((headers, body).into_response())
}
