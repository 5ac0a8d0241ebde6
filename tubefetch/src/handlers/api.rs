use std::sync::LazyLock;

use axum::{
    extract::{Query, State},
    response::{Json, Response}
};
use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, FetchError};
use crate::format::{MediaKind, Quality};
use crate::info::{fetch_info, VideoMetadata};
use crate::job::DownloadJob;
use crate::state::AppState;
use crate::stream::file_response;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+").expect("YouTube URL regex is valid")
});

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    url: Option<String>
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
    format: Option<String>,
    quality: Option<String>,
    play: Option<String>
}

pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL.is_match(url)
}

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(message))
}

fn checked_url(value: Option<&str>) -> Result<&str, AppError> {
    let url = required(value, "URL parameter is required")?;
    if !is_youtube_url(url) {
        return Err(AppError::bad_request("Invalid YouTube URL"));
    }
    Ok(url)
}

#[tracing::instrument(skip(state))]
pub async fn video_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>
) -> Result<Json<VideoMetadata>, AppError> {
    let url = checked_url(query.url.as_deref())?;

    let info = fetch_info(
        state.engine.as_ref(),
        &state.credentials,
        url,
        state.config.info_timeout
    )
    .await?;

    Ok(Json(VideoMetadata::from_info(&info)))
}

#[tracing::instrument(skip(state))]
pub async fn download_video(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>
) -> Result<Response, AppError> {
    let url = checked_url(query.url.as_deref())?;
    let format = required(query.format.as_deref(), "Format parameter is required (video or audio)")?;
    let quality_token = required(query.quality.as_deref(), "Quality parameter is required")?;
    let kind = MediaKind::parse(format)?;
    let quality = Quality::parse(kind, quality_token)?;
    let inline = query.play.as_deref() == Some("true");

    let info = fetch_info(
        state.engine.as_ref(),
        &state.credentials,
        url,
        state.config.info_timeout
    )
    .await?;
    let title = info.title.unwrap_or_else(|| "video".to_string());

    let mut job = DownloadJob::new(url, kind, quality, &state.config.temp_dir);
    tracing::info!(title = %title, base = job.base_name(), ?kind, ?quality, "starting download");
    let command = job.command(state.config.ffmpeg_path.as_deref());

    state
        .credentials
        .run(state.engine.as_ref(), &command, state.config.download_timeout)
        .await
        .map_err(|e| match e {
            FetchError::FormatUnavailable => AppError::not_found(format!(
                "The requested quality ({quality_token}) is not available for this video."
            )),
            other => other.into()
        })?;

    job.resolve(state.config.strict_output_resolution).await?;
    let path = job.hand_off().await?;

    Ok(file_response(path, kind, &title, inline).await?)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_shapes() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("http://youtube.com/shorts/abc"));
        assert!(is_youtube_url("youtu.be/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://vimeo.com/123"));
        assert!(!is_youtube_url("https://youtube.com/"));
        assert!(!is_youtube_url("https://notyoutube.com/watch?v=1"));
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(None, "missing").is_err());
        assert!(required(Some("  "), "missing").is_err());
        assert_eq!(required(Some(" video "), "missing").unwrap(), "video");
    }

    #[test]
    fn test_checked_url_messages() {
        assert_eq!(checked_url(None).unwrap_err().message, "URL parameter is required");
        assert_eq!(checked_url(Some("ftp://x")).unwrap_err().message, "Invalid YouTube URL");
    }
}
