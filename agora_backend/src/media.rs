use crate::config::{AgoraPaths, MediaConfig};
use crate::database::models::MediaRecord;
use crate::database::repositories::{MediaRepository, UserRepository};
use crate::database::Database;
use crate::error::AgoraError;
use crate::utils::{new_id, non_blank, now_utc_iso};
use agora_content::{is_persisted_url, MediaKind};
use anyhow::{Context, Result};
use blake3::Hasher;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

const OCTET_STREAM: &str = "application/octet-stream";

/// Public URL under which the raw bytes of asset `id` are served. Body
/// media nodes reference assets by this URL.
pub fn media_url(id: &str) -> String {
    format!("/media/{id}/raw")
}

#[derive(Clone)]
pub struct MediaService {
    database: Database,
    paths: AgoraPaths,
    config: MediaConfig,
}

impl MediaService {
    pub fn new(database: Database, paths: AgoraPaths, config: MediaConfig) -> Self {
        Self {
            database,
            paths,
            config,
        }
    }

    pub async fn save_upload(&self, input: SaveMediaInput) -> Result<MediaView> {
        if input.data.is_empty() {
            return Err(AgoraError::invalid("file data may not be empty"));
        }
        if input.data.len() as u64 > self.config.max_upload_bytes {
            return Err(AgoraError::invalid(format!(
                "file exceeds the upload limit of {} bytes",
                self.config.max_upload_bytes
            )));
        }

        let uploader_id = non_blank(input.uploader_id);
        if let Some(uploader) = uploader_id.as_deref() {
            let known = self
                .database
                .with_repositories(|repos| Ok(repos.users().get(uploader)?.is_some()))?;
            if !known {
                return Err(AgoraError::not_found(format!("user {uploader}")));
            }
        }

        let media_id = new_id();
        let filename = input
            .original_name
            .as_deref()
            .map(sanitize_filename)
            .unwrap_or_else(|| "upload".to_string());
        let mime = detect_mime(input.mime.as_deref(), &input.data, &filename);
        let kind = MediaKind::from_mime(&mime);

        let stored_name = match Path::new(&filename).extension().and_then(|ext| ext.to_str()) {
            Some(ext) if !ext.is_empty() => format!("{media_id}.{ext}"),
            _ => media_id.clone(),
        };
        let relative_path = format!("files/uploads/{stored_name}");
        let absolute_path = self.paths.base.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create upload directory {}", parent.display())
            })?;
        }
        fs::write(&absolute_path, &input.data)
            .await
            .with_context(|| {
                format!(
                    "failed to write uploaded media to {}",
                    absolute_path.display()
                )
            })?;

        let mut hasher = Hasher::new();
        hasher.update(&input.data);
        let checksum = format!("blake3:{}", hasher.finalize().to_hex());

        let record = MediaRecord {
            id: media_id.clone(),
            filename,
            url: media_url(&media_id),
            path: relative_path,
            media_type: kind.as_str().to_string(),
            mime: Some(mime),
            title: non_blank(input.title),
            thumbnail: non_blank(input.thumbnail).filter(|url| is_persisted_url(url)),
            uploader_id,
            size_bytes: Some(input.data.len() as i64),
            checksum: Some(checksum),
            created_at: now_utc_iso(),
        };

        self.database
            .with_repositories(|repos| repos.media().create(&record))?;
        tracing::info!(
            media_id = %record.id,
            media_type = %record.media_type,
            size_bytes = ?record.size_bytes,
            "stored media upload"
        );

        Ok(MediaView::from_record(record))
    }

    pub fn get(&self, id: &str) -> Result<Option<MediaView>> {
        let record = self.database.with_repositories(|repos| repos.media().get(id))?;
        Ok(record.map(MediaView::from_record))
    }

    /// Title is the only mutable attribute of an asset; a blank title clears it.
    pub fn update_title(&self, id: &str, title: Option<String>) -> Result<MediaView> {
        let title = non_blank(title);
        self.database.with_repositories(|repos| {
            let media = repos.media();
            if !media.set_title(id, title.as_deref())? {
                return Err(AgoraError::not_found(format!("media {id}")));
            }
            let record = media
                .get(id)?
                .context("media row vanished after title update")?;
            Ok(MediaView::from_record(record))
        })
    }

    pub async fn prepare_download(&self, id: &str) -> Result<Option<MediaDownload>> {
        let record = self
            .database
            .with_repositories(|repos| repos.media().get(id))?;
        let Some(record) = record else {
            return Ok(None);
        };
        let absolute_path = self.paths.base.join(&record.path);
        if fs::metadata(&absolute_path).await.is_err() {
            tracing::warn!(path = %absolute_path.display(), "media file missing on disk");
            return Ok(None);
        }
        Ok(Some(MediaDownload {
            metadata: MediaView::from_record(record),
            absolute_path,
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveMediaInput {
    pub original_name: Option<String>,
    pub mime: Option<String>,
    pub data: Vec<u8>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaView {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub filename: String,
    pub mime: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub uploader_id: Option<String>,
    pub created_at: String,
}

impl MediaView {
    pub(crate) fn from_record(record: MediaRecord) -> Self {
        Self {
            media_type: record
                .media_type
                .parse()
                .unwrap_or(MediaKind::Document),
            id: record.id,
            url: record.url,
            title: record.title,
            thumbnail: record.thumbnail,
            filename: record.filename,
            mime: record.mime,
            size_bytes: record.size_bytes,
            checksum: record.checksum,
            uploader_id: record.uploader_id,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub metadata: MediaView,
    pub absolute_path: PathBuf,
}

/// Declared type first, then magic bytes, then the file extension.
fn detect_mime(declared: Option<&str>, data: &[u8], filename: &str) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if !declared.is_empty() && !declared.eq_ignore_ascii_case(OCTET_STREAM) {
            return declared.to_ascii_lowercase();
        }
    }
    if let Some(sniffed) = infer::get(data) {
        return sniffed.mime_type().to_string();
    }
    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let guessed = match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("ogg" | "oga") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    };
    guessed.to_string()
}

fn sanitize_filename(name: &str) -> String {
    let sanitized: String = Path::new(name)
        .file_name()
        .and_then(|file| file.to_str())
        .unwrap_or("upload")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}
