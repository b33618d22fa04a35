//! Playlist URLs (.pls, .m3u) resolved to the stream they point at.

use anyhow::{bail, Context, Result};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    Pls,
    M3u,
}

impl PlaylistKind {
    /// Guess the playlist format from the URL path, ignoring any query.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();
        if path.ends_with(".pls") {
            Some(PlaylistKind::Pls)
        } else if path.ends_with(".m3u") || path.ends_with(".m3u8") {
            Some(PlaylistKind::M3u)
        } else {
            None
        }
    }
}

/// First `File1=` entry of a .pls playlist.
pub fn parse_pls(content: &str) -> Result<String> {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("File1="))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .context("No stream URL found in .pls file")
}

/// First entry of an .m3u playlist, skipping comments and blank lines.
pub fn parse_m3u(content: &str) -> Result<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .context("No stream URL found in .m3u file")
}

/// Fetch and parse `url` if it names a playlist, otherwise return it as is.
pub async fn resolve_stream_url(client: &reqwest::Client, url: &str) -> Result<String> {
    let Some(kind) = PlaylistKind::from_url(url) else {
        return Ok(url.to_string());
    };

    debug!("Fetching {:?} playlist from {}", kind, url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch playlist {}", url))?;
    if !response.status().is_success() {
        bail!("Failed to fetch playlist {}: HTTP {}", url, response.status());
    }
    let content = response.text().await?;

    let stream_url = match kind {
        PlaylistKind::Pls => parse_pls(&content)?,
        PlaylistKind::M3u => parse_m3u(&content)?,
    };
    debug!("Playlist {} resolved to {}", url, stream_url);
    Ok(stream_url)
}
