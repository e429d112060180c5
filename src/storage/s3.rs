use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use tracing::trace;

use crate::storage::{ObjectPage, ObjectStore, RemoteObject};

/// `ObjectStore` backed by the AWS SDK client.
#[derive(Debug, Clone)]
pub struct SdkObjectStore {
    client: Client,
}

impl SdkObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a store from the ambient AWS configuration (environment,
    /// shared config files, instance metadata).
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl ObjectStore for SdkObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage> {
        let list_objects_output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .context("aws_sdk_s3::client::list_objects_v2() failed.")?;

        let objects = list_objects_output
            .contents()
            .iter()
            .filter(|object| object.key().is_some())
            .map(|object| RemoteObject {
                key: object.key().unwrap().to_string(),
                size: object.size().unwrap_or_default(),
                last_modified: object
                    .last_modified()
                    .cloned()
                    .and_then(|last_modified| SystemTime::try_from(last_modified).ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH),
            })
            .collect();

        Ok(ObjectPage {
            objects,
            next_token: list_objects_output
                .next_continuation_token()
                .map(|token| token.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        trace!(bucket = bucket, key = key, "get_object started.");

        let get_object_output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("aws_sdk_s3::client::get_object() failed.")?;

        Ok(get_object_output.body)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: Option<String>,
        canned_acl: Option<ObjectCannedAcl>,
    ) -> Result<()> {
        trace!(bucket = bucket, key = key, "put_object started.");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .set_content_type(content_type)
            .set_acl(canned_acl)
            .send()
            .await
            .context("aws_sdk_s3::client::put_object() failed.")?;

        Ok(())
    }

    async fn copy_object(
        &self,
        bucket: &str,
        copy_source: &str,
        key: &str,
        canned_acl: Option<ObjectCannedAcl>,
    ) -> Result<()> {
        trace!(
            bucket = bucket,
            copy_source = copy_source,
            key = key,
            "copy_object started."
        );

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(urlencoding::encode(copy_source))
            .key(key)
            .set_acl(canned_acl)
            .send()
            .await
            .context("aws_sdk_s3::client::copy_object() failed.")?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        trace!(bucket = bucket, key = key, "delete_object started.");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("aws_sdk_s3::client::delete_object() failed.")?;

        Ok(())
    }
}
