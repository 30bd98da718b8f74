//! Cloudflare R2 attachment storage.

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use crate::{Error, Result};

use super::BlobStorage;

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Optional public URL base attachments are served from.
    pub public_base_url: Option<String>,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &"[REDACTED]")
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set, and an error when only
    /// part of the configuration is present.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// R2-backed [`BlobStorage`].
#[derive(Clone, Debug)]
pub struct R2Storage {
    config: R2Config,
    client: Client,
}

impl R2Storage {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }

    /// Check whether an object exists in the configured bucket.
    pub async fn object_exists(&self, object_key: &str) -> Result<bool> {
        let object_key = normalize_object_key(object_key)?;
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found) =>
            {
                Ok(false)
            }
            Err(error) => Err(storage_error(
                "head_object",
                &self.config.bucket,
                Some(&object_key),
                error,
            )),
        }
    }

    /// URL an uploaded object can be fetched from.
    #[must_use]
    pub fn object_url(&self, object_key: &str) -> String {
        let key = object_key.trim_matches('/');
        self.config.public_base_url.as_ref().map_or_else(
            || {
                format!(
                    "{}/{}/{key}",
                    self.config.endpoint_url(),
                    self.config.bucket
                )
            },
            |base| format!("{base}/{key}"),
        )
    }
}

impl BlobStorage for R2Storage {
    async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let object_key = normalize_object_key(object_key)?;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, Some(&object_key), error)
        })?;

        tracing::debug!("Uploaded attachment to R2: {object_key}");
        Ok(self.object_url(&object_key))
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;
        // S3 deletes succeed for missing keys, so check first to report NotFound
        if !self.object_exists(&object_key).await? {
            return Err(Error::NotFound(object_key));
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.config.bucket,
                    Some(&object_key),
                    error,
                )
            })?;

        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let read = |key: &str| lookup(key).map(|value| value.trim().to_string());
    let account_id = read(ENV_ACCOUNT_ID);
    let bucket = read(ENV_BUCKET);
    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
    let public_base_url = read(ENV_PUBLIC_BASE_URL);

    let any_present = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some()
        || public_base_url.is_some();

    if !any_present {
        return Ok(None);
    }

    let required = [
        (ENV_ACCOUNT_ID, account_id),
        (ENV_BUCKET, bucket),
        (ENV_ACCESS_KEY_ID, access_key_id),
        (ENV_SECRET_ACCESS_KEY, secret_access_key),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.as_ref().map_or(true, String::is_empty))
        .map(|(key, _)| *key)
        .collect();

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    let [(_, Some(account_id)), (_, Some(bucket)), (_, Some(access_key_id)), (_, Some(secret_access_key))] =
        required
    else {
        return Err(Error::Config("R2 configuration is incomplete".to_string()));
    };

    Ok(Some(R2Config {
        account_id,
        bucket,
        access_key_id,
        secret_access_key,
        public_base_url: normalize_public_base_url(public_base_url)?,
    }))
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "nudge-core-r2-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Attachment object_key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

fn normalize_content_type(content_type: &str) -> Option<&str> {
    Some(content_type.trim()).filter(|value| !value.is_empty())
}

fn normalize_public_base_url(public_base_url: Option<String>) -> Result<Option<String>> {
    let Some(value) = public_base_url.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    crate::util::normalize_base_url(&value).map(Some).ok_or_else(|| {
        Error::Config(format!(
            "{ENV_PUBLIC_BASE_URL} must start with http:// or https://"
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<R2Config>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn complete_map() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_ACCOUNT_ID, "account-1"),
            (ENV_BUCKET, "bucket-a"),
            (ENV_ACCESS_KEY_ID, "AKID123"),
            (ENV_SECRET_ACCESS_KEY, "SECRET123"),
        ])
    }

    #[test]
    fn parse_config_none_returns_none() {
        let map = HashMap::new();
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_requires_all_required_values() {
        let map = HashMap::from([(ENV_ACCOUNT_ID, "account"), (ENV_BUCKET, "bucket")]);

        let err = parse_from_map(&map).unwrap_err();
        match err {
            Error::Config(message) => {
                assert!(message.contains(ENV_ACCESS_KEY_ID));
                assert!(message.contains(ENV_SECRET_ACCESS_KEY));
                assert!(!message.contains(ENV_BUCKET));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_normalizes_public_url() {
        let mut map = complete_map();
        map.insert(ENV_PUBLIC_BASE_URL, "https://cdn.example.com/media/");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com/media")
        );
        assert_eq!(
            config.endpoint_url(),
            "https://account-1.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn parse_config_rejects_invalid_public_base_url() {
        let mut map = complete_map();
        map.insert(ENV_PUBLIC_BASE_URL, "cdn.example.com/media");

        let err = parse_from_map(&map).unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.contains(ENV_PUBLIC_BASE_URL)));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config = parse_from_map(&complete_map()).unwrap().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("SECRET123"));
        assert!(!debug.contains("AKID123"));
    }

    #[test]
    fn object_url_prefers_public_base() {
        let mut config = parse_from_map(&complete_map()).unwrap().unwrap();
        let storage = R2Storage::new(config.clone());
        assert_eq!(
            storage.object_url("users/u1/reminders/r1/photo.jpg"),
            "https://account-1.r2.cloudflarestorage.com/bucket-a/users/u1/reminders/r1/photo.jpg"
        );

        config.public_base_url = Some("https://cdn.example.com".to_string());
        let storage = R2Storage::new(config);
        assert_eq!(
            storage.object_url("/users/u1/reminders/r1/voice.mp3"),
            "https://cdn.example.com/users/u1/reminders/r1/voice.mp3"
        );
    }

    #[test]
    fn normalize_object_key_rejects_empty() {
        let err = normalize_object_key("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(message) if message.contains("object_key")));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn r2_attachment_upload_and_delete() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");
        let storage = R2Storage::new(config);
        let key = "users/integration/reminders/roundtrip/photo.jpg";

        storage.bucket_is_reachable().await.unwrap();
        storage.upload(key, b"jpeg".to_vec(), "image/jpeg").await.unwrap();
        assert!(storage.object_exists(key).await.unwrap());

        storage.delete(key).await.unwrap();
        assert!(matches!(storage.delete(key).await, Err(Error::NotFound(_))));
    }
}
