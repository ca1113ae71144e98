// Clip download via an external script

use anyhow::anyhow;
use chrono::{DateTime, Local};
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{ApiError, Result};

const MAX_PATH_LEN: usize = 250;

/// Markers the script prints on success
const SUCCESS_MARKERS: [&str; 2] = ["SUKCES", "SUCCESS"];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedClip {
    pub file_name: String,
    pub download_url: String,
}

/// Runs `<command> <script> <clip url> <output path>` and serves the results
#[derive(Debug, Clone)]
pub struct Downloader {
    command: String,
    script: PathBuf,
    dir: PathBuf,
}

/// Last path segment of a clip URL, `clip` when there is none
pub fn extract_slug(clip_url: &str) -> String {
    Url::parse(clip_url)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_else(|| "clip".to_string())
}

pub fn file_name_for(slug: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.mp4", slug, now.format("%Y%m%d_%H%M%S"))
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

impl Downloader {
    pub fn new(command: impl Into<String>, script: PathBuf, dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            script,
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn download(&self, clip_url: &str) -> Result<DownloadedClip> {
        let clip_url = clip_url.trim();
        if clip_url.is_empty() {
            return Err(ApiError::ValidationError("clipUrl is required".to_string()));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| anyhow!("Failed to create download directory: {}", e))?;

        let file_name = file_name_for(&extract_slug(clip_url), Local::now());
        let path = self.dir.join(&file_name);
        if path.as_os_str().len() > MAX_PATH_LEN {
            return Err(ApiError::ValidationError(
                "Download path is too long".to_string(),
            ));
        }

        tracing::info!(clip_url = %clip_url, file = %file_name, "Downloading clip...");

        let output = Command::new(&self.command)
            .arg(&self.script)
            .arg(clip_url)
            .arg(&path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("Failed to start download script: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            tracing::error!(
                status = ?output.status.code(),
                stdout = %stdout.trim(),
                stderr = %stderr.trim(),
                "Download script failed"
            );
            return Err(ApiError::Internal(anyhow!(
                "Download script exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        if !SUCCESS_MARKERS.iter().any(|marker| stdout.contains(marker)) {
            tracing::error!(stdout = %stdout.trim(), "Download script did not report success");
            return Err(ApiError::Internal(anyhow!(
                "Download did not report success: {}",
                stdout.trim()
            )));
        }

        tracing::info!("✅ Clip saved to {}", path.display());
        Ok(DownloadedClip {
            download_url: format!("/api/clips/download/{}", file_name),
            file_name,
        })
    }

    /// Contents of a previously downloaded file
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        if !is_safe_file_name(file_name) {
            return Err(ApiError::ValidationError("Invalid file name".to_string()));
        }

        match tokio::fs::read(self.dir.join(file_name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ApiError::NotFound(format!("File '{}' not found", file_name)))
            }
            Err(e) => Err(ApiError::Internal(anyhow!("Failed to read {}: {}", file_name, e))),
        }
    }
}
