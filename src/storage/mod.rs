use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

pub mod fs_util;
pub mod s3;

pub type ObjectStoreRef = Arc<dyn ObjectStore + Send + Sync>;

/// One object returned by a bucket listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub key: String,
    pub size: i64,
    pub last_modified: SystemTime,
}

/// One page of a bucket listing. `next_token` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    pub next_token: Option<String>,
}

/// The object store capability the engine depends on.
///
/// The production implementation is [`s3::SdkObjectStore`]; tests substitute
/// an in-memory one.
#[async_trait]
pub trait ObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: Option<String>,
        canned_acl: Option<ObjectCannedAcl>,
    ) -> Result<()>;

    async fn copy_object(
        &self,
        bucket: &str,
        copy_source: &str,
        key: &str,
        canned_acl: Option<ObjectCannedAcl>,
    ) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}
