//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bm-core.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use bm_core::{
    BackendConfig, BucketName, Error, ListResult, ObjectInfo, ObjectStore, ObjectStream, Result,
};

/// Error codes that mean the bucket or key does not exist
const NOT_FOUND_CODES: &[&str] = &["NoSuchBucket", "NoSuchKey", "NotFound"];

/// Error codes that mean the credentials were rejected
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from backend settings
    pub async fn new(backend: &BackendConfig) -> Result<Self> {
        backend.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(backend.region.clone()));

        if let Some((access_key, secret_key)) = backend.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                backend.session_token.clone(),
                None, // expiry
                "bucket-mirror-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &backend.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        // Custom endpoints are usually S3-compatible servers without DNS-style buckets
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(backend.force_path_style || backend.endpoint.is_some())
            .build();

        tracing::debug!(
            region = %backend.region,
            endpoint = backend.endpoint.as_deref().unwrap_or("default"),
            static_credentials = backend.static_credentials().is_some(),
            "created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, bucket: &BucketName) -> Result<ListResult> {
        // No delimiter: keys come back flat, directory markers included
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("Bucket not found: {bucket}")))?;

        let items = response
            .contents()
            .iter()
            .map(|object| {
                let mut info = ObjectInfo::new(object.key().unwrap_or_default())
                    .with_size(object.size().unwrap_or(0));

                if let Some(modified) = object.last_modified() {
                    info.last_modified = jiff::Timestamp::from_second(modified.secs()).ok();
                }

                if let Some(etag) = object.e_tag() {
                    info.etag = Some(etag.trim_matches('"').to_string());
                }

                info
            })
            .collect();

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn get_object(&self, bucket: &BucketName, key: &str) -> Result<ObjectStream> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        Ok(Box::pin(response.body.into_async_read()))
    }
}

/// Classify an SDK error by its S3 error code
///
/// `resource` describes what was being accessed and is used for `NotFound`.
fn map_sdk_error<E, R>(err: SdkError<E, R>, resource: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    classify(code.as_deref(), resource, DisplayErrorContext(&err).to_string())
}

fn classify(code: Option<&str>, resource: &str, message: String) -> Error {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => Error::NotFound(resource.to_string()),
        Some(code) if AUTH_CODES.contains(&code) => Error::Auth(message),
        _ => Error::Network(message),
    }
}
