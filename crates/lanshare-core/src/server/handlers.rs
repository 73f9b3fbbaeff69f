//! HTTP handlers for the content server.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::multipart::{Field, Multipart};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::error::{ApiError, ApiResult};
use super::{Content, SharedState};
use crate::archive;
use crate::naming;
use crate::progress::ProgressSlot;
use crate::protocol::{self, DOWNLOAD_PATH, UPLOAD_FIELD, UPLOAD_PATH};

/// GET /lanshare - Capability probe.
pub(super) async fn probe(State(state): State<SharedState>) -> &'static str {
    state.content.role().label()
}

/// GET / - Landing page for browsers.
pub(super) async fn index(State(state): State<SharedState>) -> Html<String> {
    let mut body = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>LanShare</title>\n</head>\n<body>\n",
    );

    match &state.content {
        Content::Text(text) => {
            let _ = writeln!(body, "<pre>{}</pre>", escape_html(text));
        }
        Content::File(file) => {
            let _ = writeln!(
                body,
                "<a href=\"{DOWNLOAD_PATH}\">Download {} ({})</a>",
                escape_html(file.name()),
                naming::format_size(file.size())
            );
        }
        Content::Inbox => {
            let _ = writeln!(
                body,
                "<form action=\"{UPLOAD_PATH}\" method=\"post\" enctype=\"multipart/form-data\">\n\
                 <input name=\"{UPLOAD_FIELD}\" type=\"file\"/>\n\
                 <input type=\"submit\" value=\"Upload\"/>\n</form>"
            );
        }
    }

    body.push_str("</body>\n</html>\n");
    Html(body)
}

/// GET /text - Return the shared text.
pub(super) async fn text(State(state): State<SharedState>, request: Request) -> ApiResult<String> {
    let Content::Text(text) = &state.content else {
        return Err(ApiError::not_found("this session does not share text"));
    };

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => tracing::info!(peer = %peer, "Text fetched"),
        None => tracing::info!("Text fetched"),
    }

    Ok(text.clone())
}

/// GET/HEAD /download - Stream the shared file.
///
/// Metadata headers are identical for both methods; HEAD carries no body.
pub(super) async fn download(State(state): State<SharedState>, method: Method) -> ApiResult<Response> {
    let Content::File(file) = &state.content else {
        return Err(ApiError::not_found("this session does not share a file"));
    };

    let descriptor = file.descriptor();
    let mut headers = HeaderMap::new();
    descriptor.write_headers(&mut headers)?;

    if method == Method::HEAD {
        tracing::debug!(file = %descriptor.file_name, "Answered metadata request");
        return Ok((headers, Body::empty()).into_response());
    }

    let handle = tokio::fs::File::open(file.path()).await?;
    let stream = ReaderStream::with_capacity(handle, state.config.chunk_size.max(1));

    tracing::info!(
        file = %descriptor.file_name,
        size = descriptor.file_size,
        "Serving download"
    );

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// POST /upload - Receive one file.
///
/// Waits for a progress slot, streams the first multipart field to a fresh
/// name in the output directory and extracts it when it is an archive and
/// archive handling is on. Partial files are removed on failure.
pub(super) async fn upload(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<String> {
    let slot = state.progress.acquire().await?;

    let mut field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let raw_name = field
        .file_name()
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(protocol::headers::FILE_NAME)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).to_string())
        })
        .ok_or_else(|| ApiError::bad_request("Upload has no file name"))?;
    let name = naming::sanitize_file_name(&raw_name)?;
    slot.set_label(&name);

    let handle_archives = protocol::compress_flag(&headers).unwrap_or(state.config.decompress);

    tokio::fs::create_dir_all(&state.config.output_dir).await?;
    let destination = naming::resolve(&state.config.output_dir, &name);
    let output = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&destination)
        .await?;
    let partial = PartialUpload::new(destination.clone());

    let size = match write_field(&mut field, output, &slot).await {
        Ok(size) => size,
        Err(e) => {
            tracing::warn!(file = %name, slot = slot.id(), "Upload failed: {}", e.message);
            return Err(e);
        }
    };
    partial.keep();

    tracing::info!(
        file = %name,
        path = %destination.display(),
        size,
        slot = slot.id(),
        "Upload received"
    );

    if handle_archives && archive::is_archive_async(destination.clone()).await {
        extract_upload(&destination).await;
    }

    Ok(format!(
        "{name} ({}) successfully received!",
        naming::format_size(size)
    ))
}

async fn write_field(field: &mut Field, mut output: tokio::fs::File, slot: &ProgressSlot) -> ApiResult<u64> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {e}")))?
    {
        output.write_all(&chunk).await?;
        slot.advance(chunk.len() as u64);
    }
    output.flush().await?;
    Ok(slot.bytes())
}

/// Removes an unfinished upload when dropped.
///
/// The handler future is dropped outright when the uploader disconnects, so
/// cleanup cannot rely on reaching an error branch.
struct PartialUpload {
    path: Option<PathBuf>,
}

impl PartialUpload {
    const fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed partial upload"),
                Err(e) => tracing::warn!(path = %path.display(), "Failed to remove partial upload: {e}"),
            }
        }
    }
}

async fn extract_upload(archive_path: &Path) {
    match archive::decompress_async(archive_path.to_path_buf()).await {
        Ok(dir) => {
            tracing::info!(dir = %dir.display(), "Decompressed upload");
            if let Err(e) = tokio::fs::remove_file(archive_path).await {
                tracing::warn!(path = %archive_path.display(), "Failed to remove archive: {e}");
            }
        }
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), "Failed to decompress upload, keeping archive: {e}");
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_upload_guard() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.bin");
        let kept = dir.path().join("kept.bin");
        std::fs::write(&dropped, b"partial").unwrap();
        std::fs::write(&kept, b"complete").unwrap();

        drop(PartialUpload::new(dropped.clone()));
        PartialUpload::new(kept.clone()).keep();

        assert!(!dropped.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
