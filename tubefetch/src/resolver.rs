//! Locates the finished artifact among the files yt-dlp left behind.
//!
//! yt-dlp has no stable contract for the final filename: a merge may leave
//! `<base>.f137.mp4`-style intermediates next to (or instead of) the merged
//! file, and an earlier failed attempt may have left `.part` files.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FetchError;

static FORMAT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.f\d+\.").expect("format code regex is valid"));

/// Which rule picked the file, from most to least confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Exact,
    Merged,
    Shortest,
    FirstListed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub name: String,
    pub tier: Tier
}

/// Files in `dir` whose name starts with `base`, `.part` leftovers excluded,
/// sorted by name.
pub async fn job_files(dir: &Path, base: &str) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(base) && !name.ends_with(".part") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Chooses the artifact among `names` (already filtered to the job).
pub fn pick_candidate(names: &[String], base: &str, ext: &str) -> Option<Resolved> {
    let exact = format!("{base}.{ext}");
    if names.iter().any(|name| *name == exact) {
        return Some(Resolved {
            name: exact,
            tier: Tier::Exact
        });
    }

    let suffix = format!(".{ext}");
    let with_ext: Vec<&String> = names.iter().filter(|name| name.ends_with(&suffix)).collect();

    if let Some(name) = with_ext.iter().find(|name| !FORMAT_CODE.is_match(name)) {
        return Some(Resolved {
            name: (*name).clone(),
            tier: Tier::Merged
        });
    }

    if let Some(name) = with_ext.iter().min_by_key(|name| name.len()) {
        return Some(Resolved {
            name: (*name).clone(),
            tier: Tier::Shortest
        });
    }

    names.first().map(|name| Resolved {
        name: name.clone(),
        tier: Tier::FirstListed
    })
}

/// Resolves the artifact for `base` inside `dir` and checks it still exists.
pub async fn resolve_output(dir: &Path, base: &str, ext: &str, strict: bool) -> Result<PathBuf, FetchError> {
    let names = job_files(dir, base).await?;
    tracing::debug!(base, files = ?names, "resolving yt-dlp output");

    let Some(resolved) = pick_candidate(&names, base, ext) else {
        tracing::error!(base, "no output file found in {}", dir.display());
        return Err(FetchError::OutputNotFound);
    };

    match resolved.tier {
        Tier::Exact | Tier::Merged => {}
        Tier::Shortest => {
            tracing::warn!(base, file = %resolved.name, "no merged output, using shortest .{} candidate", ext);
        }
        Tier::FirstListed if strict => {
            tracing::error!(base, file = %resolved.name, "no .{} output and strict resolution is enabled", ext);
            return Err(FetchError::OutputNotFound);
        }
        Tier::FirstListed => {
            tracing::warn!(base, file = %resolved.name, "no .{} output, falling back to first file", ext);
        }
    }

    let path = dir.join(&resolved.name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => {
            tracing::error!(base, "resolved output {} disappeared", path.display());
            Err(FetchError::OutputNotFound)
        }
    }
}
