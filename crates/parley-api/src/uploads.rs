use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Cloudinary is not configured")]
    NotConfigured,

    #[error("{0}")]
    Provider(String),

    #[error("Upload failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Hosted copy of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub url: String,
    pub public_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: Option<u64>,
    pub format: Option<String>,
    pub resource_type: Option<String>,
    pub original_filename: Option<String>,
}

/// Remote object storage that can ingest a file by URL
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn store_remote(&self, file_url: &str, folder: &str) -> Result<StoredFile, UploadError>;
}

/// Unsigned uploads through a Cloudinary upload preset
pub struct CloudinaryStorage {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryStorage {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: CLOUDINARY_API_BASE.to_string(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn upload_url(&self) -> String {
        // No resource type segment: Cloudinary detects it
        format!("{}/v1_1/{}/upload", self.base_url, self.cloud_name)
    }
}

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    secure_url: String,
    public_id: String,
    width: Option<u32>,
    height: Option<u32>,
    bytes: Option<u64>,
    format: Option<String>,
    resource_type: Option<String>,
    original_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    error: Option<CloudinaryErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorDetail {
    message: String,
}

#[async_trait]
impl ObjectStorage for CloudinaryStorage {
    async fn store_remote(&self, file_url: &str, folder: &str) -> Result<StoredFile, UploadError> {
        let form = Form::new()
            .text("file", file_url.to_string())
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.to_string());

        let response = self.http.post(self.upload_url()).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CloudinaryErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("Cloudinary upload failed ({})", status));
            return Err(UploadError::Provider(message));
        }

        let upload: CloudinaryUpload = response.json().await?;
        tracing::info!(public_id = %upload.public_id, folder, "File uploaded");

        Ok(StoredFile {
            url: upload.secure_url,
            public_id: upload.public_id,
            width: upload.width,
            height: upload.height,
            bytes: upload.bytes,
            format: upload.format,
            resource_type: upload.resource_type,
            original_filename: upload.original_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_posts_preset_and_folder() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/upload")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::Regex("name=\"upload_preset\"\r\n\r\nunsigned".to_string()),
                mockito::Matcher::Regex("chat-uploads/alice".to_string()),
                mockito::Matcher::Regex("https://files.example/cat.png".to_string()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "secure_url": "https://res.cloudinary.com/demo/cat.png",
                    "public_id": "chat-uploads/alice/cat",
                    "width": 64,
                    "height": 32,
                    "bytes": 2048,
                    "format": "png",
                    "resource_type": "image",
                    "original_filename": "cat"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let storage = CloudinaryStorage::new("demo", "unsigned").with_base_url(server.url());
        let stored = storage
            .store_remote("https://files.example/cat.png", "chat-uploads/alice")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(stored.url, "https://res.cloudinary.com/demo/cat.png");
        assert_eq!(stored.width, Some(64));
        assert_eq!(stored.resource_type.as_deref(), Some("image"));
    }

    #[tokio::test]
    async fn test_provider_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1_1/demo/upload")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Upload preset not found"}}"#)
            .create_async()
            .await;

        let storage = CloudinaryStorage::new("demo", "missing").with_base_url(server.url());
        let err = storage.store_remote("https://x/y.pdf", "f").await.unwrap_err();

        assert_eq!(err.to_string(), "Upload preset not found");
    }
}
