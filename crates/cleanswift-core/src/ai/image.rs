//! Resolving image references into bytes for the vision model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::error::AiError;

const DEFAULT_MIME: &str = "image/jpeg";

/// Raw image bytes with their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(data_url: &str) -> Result<ImagePayload, AiError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AiError::Image("not a data URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AiError::Image("data URL has no payload".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| AiError::Image("only base64 data URLs are supported".into()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AiError::Image(format!("invalid base64 payload: {e}")))?;
    if bytes.is_empty() {
        return Err(AiError::Image("image is empty".into()));
    }
    Ok(ImagePayload {
        mime: if mime.is_empty() { DEFAULT_MIME } else { mime }.to_string(),
        bytes,
    })
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => DEFAULT_MIME,
    }
}

/// Resolve any supported image reference into bytes.
///
/// `data:` URLs are decoded, http(s) URLs fetched and anything that does not
/// parse as a URL is read as a local file.
pub async fn resolve(http: &reqwest::Client, image_ref: &str) -> Result<ImagePayload, AiError> {
    let image_ref = image_ref.trim();
    if image_ref.starts_with("data:") {
        return decode_data_url(image_ref);
    }

    match url::Url::parse(image_ref) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let response = http.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AiError::Image(format!("fetching image returned HTTP {status}")));
            }
            let mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(|v| v.trim().to_string())
                .filter(|v| v.starts_with("image/"))
                .unwrap_or_else(|| DEFAULT_MIME.to_string());
            let bytes = response.bytes().await?.to_vec();
            if bytes.is_empty() {
                return Err(AiError::Image("image is empty".into()));
            }
            Ok(ImagePayload { mime, bytes })
        }
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| AiError::Image(format!("bad file URL: {image_ref}")))?;
            read_file(&path).await
        }
        // Windows drive letters parse as a one-letter scheme.
        Ok(url) if url.scheme().len() > 1 => Err(AiError::Image(format!(
            "unsupported image scheme '{}'",
            url.scheme()
        ))),
        _ => read_file(Path::new(image_ref)).await,
    }
}

async fn read_file(path: &Path) -> Result<ImagePayload, AiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AiError::Image(format!("cannot read {}: {e}", path.display())))?;
    if bytes.is_empty() {
        return Err(AiError::Image(format!("{} is empty", path.display())));
    }
    Ok(ImagePayload {
        mime: mime_for_path(path).to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_data_url() {
        let payload = decode_data_url("data:image/png;base64,iVBORw0K").unwrap();
        assert_eq!(payload.mime, "image/png");
        assert_eq!(&payload.bytes[..4], b"\x89PNG");
        assert_eq!(payload.to_data_url(), "data:image/png;base64,iVBORw0K");
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert!(decode_data_url("data:image/png,plain").is_err());
        assert!(decode_data_url("data:image/png;base64,%%%").is_err());
        assert!(decode_data_url("data:image/png;base64,").is_err());
        assert!(decode_data_url("image/png;base64,AAAA").is_err());
    }

    #[tokio::test]
    async fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.PNG");
        std::fs::write(&path, b"fake-png").unwrap();

        let client = reqwest::Client::new();
        let payload = resolve(&client, path.to_str().unwrap()).await.unwrap();
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.bytes, b"fake-png");

        let file_url = url::Url::from_file_path(&path).unwrap();
        let payload = resolve(&client, file_url.as_str()).await.unwrap();
        assert_eq!(payload.bytes, b"fake-png");

        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            resolve(&client, empty.to_str().unwrap()).await,
            Err(AiError::Image(ref msg)) if msg.ends_with("is empty")
        ));

        let missing = dir.path().join("missing.jpg");
        assert!(resolve(&client, missing.to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn fetches_http_images() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/room.webp")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body("webp-bytes")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let payload = resolve(&client, &format!("{}/room.webp", server.url()))
            .await
            .unwrap();
        assert_eq!(payload.mime, "image/webp");
        assert_eq!(payload.bytes, b"webp-bytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_failure_is_an_image_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.jpg")
            .with_status(404)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = resolve(&client, &format!("{}/gone.jpg", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Image(_)));
    }

    #[tokio::test]
    async fn unsupported_scheme() {
        let client = reqwest::Client::new();
        let err = resolve(&client, "ftp://example.com/room.jpg").await.unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }
}
