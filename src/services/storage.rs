use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Durable storage for images handed to the detection worker.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;
}

/// Client for S3-compatible object storage.
pub struct S3Client {
    bucket: Box<Bucket>,
}

impl S3Client {
    /// Without an explicit endpoint the named AWS region is used. Custom
    /// endpoints are addressed path-style. Missing keys fall back to the
    /// default AWS credential chain.
    pub fn new(
        bucket_name: &str,
        region_name: &str,
        endpoint: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> Result<Self, StorageError> {
        let path_style = endpoint.is_some();
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region_name.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region_name
                .parse::<Region>()
                .map_err(|e| StorageError::Config(e.to_string()))?,
        };

        let credentials = Credentials::new(access_key, secret_key, None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        if path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

#[async_trait]
impl BlobStore for S3Client {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected { key: key.to_string(), status });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Upload of {key} rejected with HTTP {status}")]
    Rejected { key: String, status: u16 },

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::Router;

    async fn serve_status(status: StatusCode) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(move || async move { status });
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(endpoint: &str) -> S3Client {
        S3Client::new(
            "polybot-test",
            "us-east-1",
            Some(endpoint),
            Some("test-access"),
            Some("test-secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_rejected_by_bucket_is_an_error() {
        let endpoint = serve_status(StatusCode::FORBIDDEN).await;

        let err = client(&endpoint)
            .upload("abc/photo.jpg", b"jpeg", "image/jpeg")
            .await
            .unwrap_err();

        assert!(
            matches!(err, StorageError::Rejected { status: 403, ref key } if key == "abc/photo.jpg"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_upload_accepted_by_bucket() {
        let endpoint = serve_status(StatusCode::OK).await;

        client(&endpoint)
            .upload("abc/photo.jpg", b"jpeg", "image/jpeg")
            .await
            .unwrap();
    }
}
