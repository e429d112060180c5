use percent_encoding::percent_decode_str;
use url::{ParseError, Url};

use crate::types::error::SyncError;
use crate::types::{S3Path, StoragePath};

/// Parses a location string into a storage path.
///
/// A location is either an `s3://bucket/prefix` URL or a plain local path.
/// Anything that parses as a URL with a scheme other than `s3` is rejected.
pub fn parse_storage_path(location: &str) -> Result<StoragePath, SyncError> {
    if location.is_empty() {
        return Err(SyncError::InvalidStorageLocation(location.to_string()));
    }

    let result = Url::parse(location);
    if result == Err(ParseError::RelativeUrlWithoutBase) {
        return Ok(StoragePath::Local(location.into()));
    }

    let parsed = result.map_err(|_| SyncError::InvalidStorageLocation(location.to_string()))?;
    if parsed.scheme() != "s3" {
        return Err(SyncError::InvalidStorageLocation(location.to_string()));
    }

    let bucket = parsed
        .host_str()
        .ok_or_else(|| SyncError::BucketNameNotFound(location.to_string()))?
        .to_string();

    let mut prefix = parsed.path().to_string();
    // remove first '/'
    if !prefix.is_empty() {
        prefix.remove(0);
    }

    let prefix = percent_decode_str(&prefix)
        .decode_utf8()
        .map_err(|_| SyncError::InvalidStorageLocation(location.to_string()))?
        .to_string();

    Ok(StoragePath::S3(S3Path { bucket, prefix }))
}

pub fn is_both_storage_local(source: &StoragePath, target: &StoragePath) -> bool {
    matches!(source, StoragePath::Local(_)) && matches!(target, StoragePath::Local(_))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn parse_local_relative_path() {
        init_dummy_tracing_subscriber();

        if let StoragePath::Local(path) = parse_storage_path("dir1/").unwrap() {
            assert_eq!(path, PathBuf::from("dir1/"));
        } else {
            panic!("local path not found");
        }
    }

    #[test]
    fn parse_local_unix_absolute_path() {
        init_dummy_tracing_subscriber();

        if let StoragePath::Local(path) = parse_storage_path("/dir1").unwrap() {
            assert_eq!(path, PathBuf::from("/dir1"));
        } else {
            panic!("local path not found");
        }
    }

    #[test]
    fn parse_s3_url_with_no_key() {
        init_dummy_tracing_subscriber();

        if let StoragePath::S3(path) = parse_storage_path("s3://test-bucket").unwrap() {
            assert_eq!(path.bucket, "test-bucket");
            assert_eq!(path.prefix, "");
        } else {
            panic!("s3 url not found");
        }
    }

    #[test]
    fn parse_s3_url_with_key_without_slash() {
        init_dummy_tracing_subscriber();

        if let StoragePath::S3(path) = parse_storage_path("s3://test-bucket/my_key").unwrap() {
            assert_eq!(path.bucket, "test-bucket");
            assert_eq!(path.prefix, "my_key");
        } else {
            panic!("s3 url not found");
        }
    }

    #[test]
    fn parse_s3_url_with_key_ends_with_slash() {
        init_dummy_tracing_subscriber();

        if let StoragePath::S3(path) = parse_storage_path("s3://test-bucket/my_key/").unwrap() {
            assert_eq!(path.bucket, "test-bucket");
            assert_eq!(path.prefix, "my_key/");
        } else {
            panic!("s3 url not found");
        }
    }

    #[test]
    fn parse_s3_url_with_nested_key() {
        init_dummy_tracing_subscriber();

        if let StoragePath::S3(path) =
            parse_storage_path("s3://test-bucket/dir1/dir2/my_key").unwrap()
        {
            assert_eq!(path.bucket, "test-bucket");
            assert_eq!(path.prefix, "dir1/dir2/my_key");
        } else {
            panic!("s3 url not found");
        }
    }

    #[test]
    fn parse_s3_url_with_utf8_key() {
        init_dummy_tracing_subscriber();

        if let StoragePath::S3(path) =
            parse_storage_path("s3://test-bucket/こんにちは/Καλησπέρα σας").unwrap()
        {
            assert_eq!(path.bucket, "test-bucket");
            assert_eq!(path.prefix, "こんにちは/Καλησπέρα σας");
        } else {
            panic!("s3 url not found");
        }
    }

    #[test]
    fn empty_location() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            parse_storage_path("").unwrap_err(),
            SyncError::InvalidStorageLocation("".to_string())
        );
    }

    #[test]
    fn invalid_scheme() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            parse_storage_path("https://my-bucket").unwrap_err(),
            SyncError::InvalidStorageLocation("https://my-bucket".to_string())
        );
    }

    #[test]
    fn no_bucket_name() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            parse_storage_path("s3://").unwrap_err(),
            SyncError::BucketNameNotFound("s3://".to_string())
        );
    }

    #[test]
    fn both_storage_local() {
        init_dummy_tracing_subscriber();

        assert!(is_both_storage_local(
            &StoragePath::Local("/source".into()),
            &StoragePath::Local("/target".into()),
        ));

        assert!(!is_both_storage_local(
            &StoragePath::Local("/source".into()),
            &parse_storage_path("s3://target-bucket").unwrap(),
        ));
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
