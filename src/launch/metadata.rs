//! Token metadata publishing to a content-addressed store
//!
//! The image is pinned first; its gateway URL goes into the JSON metadata
//! document, which is pinned second. The launch API receives the URL of the
//! JSON document. Neither call retries; the per-wallet launch loop does.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::SocialLinks;
use crate::config::StorageConfig;
use crate::errors::{LaunchError, LaunchResult};

const SERVICE: &str = "pinata";

/// File received from the user
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Stable identifier and public fetch URL of a pinned object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedContent {
    pub content_id: String,
    pub url: String,
}

/// Image and metadata document of one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMetadata {
    pub image: PublishedContent,
    pub metadata: PublishedContent,
}

/// Fields of the metadata document besides the image
#[derive(Debug, Clone)]
pub struct MetadataFields<'a> {
    pub name: &'a str,
    pub symbol: &'a str,
    pub description: &'a str,
    pub social_links: &'a SocialLinks,
}

/// Metadata JSON in the layout the launchpad renders
pub fn metadata_document(fields: &MetadataFields<'_>, image_url: &str) -> Value {
    let mut doc = json!({
        "name": fields.name,
        "symbol": fields.symbol,
        "description": fields.description,
        "image": image_url,
        "showName": true,
    });
    let links = [
        ("twitter", &fields.social_links.twitter),
        ("website", &fields.social_links.website),
        ("telegram", &fields.social_links.telegram),
    ];
    for (key, value) in links {
        if let Some(v) = value {
            doc[key] = Value::String(v.clone());
        }
    }
    doc
}

#[async_trait]
pub trait MetadataPublisher: Send + Sync {
    async fn publish_file(&self, file: &UploadFile) -> LaunchResult<PublishedContent>;

    async fn publish_json(&self, name: &str, document: &Value) -> LaunchResult<PublishedContent>;

    async fn fetch(&self, content_id: &str) -> LaunchResult<Bytes>;

    /// Pin the image, then the metadata document pointing at it
    async fn publish(
        &self,
        file: &UploadFile,
        fields: &MetadataFields<'_>,
    ) -> LaunchResult<PublishedMetadata> {
        let image = self.publish_file(file).await?;
        let document = metadata_document(fields, &image.url);
        let metadata = self
            .publish_json(&format!("{}-metadata.json", fields.symbol), &document)
            .await?;
        Ok(PublishedMetadata { image, metadata })
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata-backed [`MetadataPublisher`]
pub struct PinataPublisher {
    http: Client,
    api_url: String,
    jwt: String,
    gateway: String,
}

impl PinataPublisher {
    pub fn new(config: &StorageConfig) -> LaunchResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| LaunchError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            jwt: config.jwt.clone(),
            gateway: config.gateway.trim_end_matches('/').to_string(),
        })
    }

    /// Public gateway URL of a content identifier
    pub fn gateway_url(&self, content_id: &str) -> String {
        if self.gateway.starts_with("http://") || self.gateway.starts_with("https://") {
            format!("{}/ipfs/{}", self.gateway, content_id)
        } else {
            format!("https://{}/ipfs/{}", self.gateway, content_id)
        }
    }

    async fn pin(&self, request: reqwest::RequestBuilder) -> LaunchResult<PublishedContent> {
        let response = request.bearer_auth(&self.jwt).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LaunchError::external(
                SERVICE,
                format!("pin failed with {}: {}", status, body),
            ));
        }

        let pinned: PinResponse = response.json().await?;
        debug!(content_id = %pinned.ipfs_hash, "Pinned content");
        Ok(PublishedContent {
            url: self.gateway_url(&pinned.ipfs_hash),
            content_id: pinned.ipfs_hash,
        })
    }
}

#[async_trait]
impl MetadataPublisher for PinataPublisher {
    async fn publish_file(&self, file: &UploadFile) -> LaunchResult<PublishedContent> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| LaunchError::external(SERVICE, format!("invalid content type: {}", e)))?;
        let form = Form::new().part("file", part);

        self.pin(
            self.http
                .post(format!("{}/pinning/pinFileToIPFS", self.api_url))
                .multipart(form),
        )
        .await
    }

    async fn publish_json(&self, name: &str, document: &Value) -> LaunchResult<PublishedContent> {
        let body = json!({
            "pinataContent": document,
            "pinataMetadata": { "name": name },
        });

        self.pin(
            self.http
                .post(format!("{}/pinning/pinJSONToIPFS", self.api_url))
                .json(&body),
        )
        .await
    }

    async fn fetch(&self, content_id: &str) -> LaunchResult<Bytes> {
        let response = self.http.get(self.gateway_url(content_id)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LaunchError::external(
                SERVICE,
                format!("fetch of {} failed with {}", content_id, status),
            ));
        }
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn publisher(server: &mockito::ServerGuard) -> PinataPublisher {
        PinataPublisher::new(&StorageConfig {
            api_url: server.url(),
            jwt: "test-jwt".to_string(),
            gateway: server.url(),
            http_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_metadata_document_layout() {
        let links = SocialLinks {
            twitter: Some("https://x.com/pb".to_string()),
            website: None,
            telegram: Some("https://t.me/pb".to_string()),
        };
        let fields = MetadataFields {
            name: "Boost",
            symbol: "PB",
            description: "to the moon",
            social_links: &links,
        };

        let doc = metadata_document(&fields, "https://gw/ipfs/QmImage");
        assert_eq!(doc["image"], "https://gw/ipfs/QmImage");
        assert_eq!(doc["twitter"], "https://x.com/pb");
        assert!(doc.get("website").is_none());
        assert_eq!(doc["showName"], true);
    }

    #[test]
    fn test_gateway_url_without_scheme() {
        let publisher = PinataPublisher::new(&StorageConfig {
            gateway: "example.mypinata.cloud".to_string(),
            ..StorageConfig::default()
        })
        .unwrap();
        assert_eq!(
            publisher.gateway_url("QmHash"),
            "https://example.mypinata.cloud/ipfs/QmHash"
        );
    }

    #[tokio::test]
    async fn test_publish_pins_image_then_metadata() {
        let mut server = mockito::Server::new_async().await;
        let file_mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .match_header("authorization", "Bearer test-jwt")
            .with_status(200)
            .with_body(r#"{"IpfsHash":"QmImage","PinSize":3,"Timestamp":"2024-01-01T00:00:00Z"}"#)
            .create_async()
            .await;
        let json_mock = server
            .mock("POST", "/pinning/pinJSONToIPFS")
            .match_body(Matcher::PartialJsonString(format!(
                r#"{{"pinataContent":{{"image":"{}/ipfs/QmImage","symbol":"PB"}}}}"#,
                server.url()
            )))
            .with_status(200)
            .with_body(r#"{"IpfsHash":"QmMeta","PinSize":120,"Timestamp":"2024-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let links = SocialLinks::default();
        let fields = MetadataFields {
            name: "Boost",
            symbol: "PB",
            description: "",
            social_links: &links,
        };
        let file = UploadFile::new("logo.png", "image/png", Bytes::from_static(b"png"));

        let published = publisher(&server).publish(&file, &fields).await.unwrap();
        assert_eq!(published.image.content_id, "QmImage");
        assert_eq!(published.metadata.content_id, "QmMeta");
        assert_eq!(published.metadata.url, format!("{}/ipfs/QmMeta", server.url()));

        file_mock.assert_async().await;
        json_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pin_failure_is_external_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let file = UploadFile::new("logo.png", "image/png", Bytes::from_static(b"png"));
        let err = publisher(&server).publish_file(&file).await.unwrap_err();
        assert!(matches!(err, LaunchError::ExternalService { .. }));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ipfs/QmImage")
            .with_status(200)
            .with_body(vec![1u8, 2, 3])
            .create_async()
            .await;

        let bytes = publisher(&server).fetch("QmImage").await.unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
    }
}
