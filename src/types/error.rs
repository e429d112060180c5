use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SyncError {
    #[error("local to local sync is not supported")]
    LocalToLocalNotSupported,
    #[error("invalid storage location: {0}")]
    InvalidStorageLocation(String),
    #[error("bucket name must be specified: {0}")]
    BucketNameNotFound(String),
    #[error("cancelled")]
    Cancelled,
}
