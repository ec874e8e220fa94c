//! Object storage abstraction.
//!
//! Provides a unified interface over S3 and the local filesystem for
//! reading source exports and replacing output tables.

mod local;
mod s3;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^(?P<path>/.*)$";
const RELATIVE_PATH: &str = r"^(?P<path>\.{1,2}/.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
}

/// Backends in match order; S3 goes first so `s3::` URLs never fall through.
static MATCHERS: LazyLock<Vec<(Backend, Vec<Regex>)>> = LazyLock::new(|| {
    let compile = |patterns: &[&str]| {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("storage URL patterns are valid regexes"))
            .collect::<Vec<_>>()
    };
    vec![
        (
            Backend::S3,
            compile(&[S3_PATH, S3_VIRTUAL, S3_ENDPOINT_URL, S3_URL]),
        ),
        (
            Backend::Local,
            compile(&[FILE_URI, FILE_URL, FILE_PATH, RELATIVE_PATH]),
        ),
    ]
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, patterns) in MATCHERS.iter() {
            if let Some(matches) = patterns.iter().find_map(|r| r.captures(url)) {
                return Ok(match backend {
                    Backend::S3 => Self::parse_s3(&matches),
                    Backend::Local => Self::parse_local(&matches),
                });
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: &regex::Captures) -> Self {
        let bucket = matches
            .name("bucket")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            matches.name("endpoint").map(|endpoint| {
                let port = matches
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                let protocol = matches
                    .name("protocol")
                    .map(|p| p.as_str())
                    .unwrap_or("https");
                format!("{}://{}:{}", protocol, endpoint.as_str(), port)
            })
        });

        let key = matches
            .name("key")
            .map(|m| Path::from(m.as_str().trim_end_matches('/')));

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        })
    }

    fn parse_local(matches: &regex::Captures) -> Self {
        let path = matches
            .name("path")
            .map(|m| m.as_str())
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        BackendConfig::Local(LocalConfig { path })
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(&path)).await;
        record_request(StorageOperation::Get, result.is_ok(), start);

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        debug!("Read {} bytes from {}/{}", bytes.len(), self.canonical_url, path);
        Ok(bytes)
    }

    /// Put a payload to a path, overwriting any existing object.
    pub async fn put(&self, path: &Path, bytes: Bytes) -> Result<(), StorageError> {
        let qualified = self.qualify_path(path);
        let start = Instant::now();
        let result = self
            .object_store
            .put(&qualified, PutPayload::from(bytes))
            .await;
        record_request(StorageOperation::Put, result.is_ok(), start);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// List objects under a prefix (relative to the configured root).
    ///
    /// Returned paths are relative to the root, matching the contract of
    /// `get`, `put` and `delete`.
    pub async fn list_with_prefix(&self, prefix: &str) -> Result<Vec<Path>, StorageError> {
        let full_prefix = self.qualify_path(&Path::from(prefix)).into_owned();
        let root_parts = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let start = Instant::now();
        let result: Result<Vec<_>, _> = self
            .object_store
            .list(Some(&full_prefix))
            .try_collect()
            .await;
        record_request(StorageOperation::List, result.is_ok(), start);

        let listed = match result {
            Ok(listed) => listed,
            // A prefix that was never written is simply empty
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(source) => return Err(StorageError::ObjectStore { source }),
        };

        Ok(listed
            .into_iter()
            .map(|meta| meta.location.parts().skip(root_parts).collect())
            .collect())
    }

    /// Delete an object.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let qualified = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.delete(&qualified).await;
        record_request(StorageOperation::Delete, result.is_ok(), start);

        match result {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    /// Delete every object under a prefix except `keep`. Returns the number deleted.
    pub async fn delete_prefix_except(
        &self,
        prefix: &str,
        keep: &Path,
    ) -> Result<usize, StorageError> {
        let stale: Vec<Path> = self
            .list_with_prefix(prefix)
            .await?
            .into_iter()
            .filter(|path| path != keep)
            .collect();
        for path in &stale {
            self.delete(path).await?;
        }
        Ok(stale.len())
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Canonical URL of the storage root, used in log lines.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }
}

fn record_request(operation: StorageOperation, ok: bool, start: Instant) {
    let status = if ok {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    };
    emit!(StorageRequest { operation, status });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_s3_urls() {
        let config = BackendConfig::parse_url("s3://olist-raw/exports/2018").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "olist-raw");
                assert_eq!(s3.key, Some(Path::from("exports/2018")));
            }
            other => panic!("expected S3, got {other:?}"),
        }

        let config = BackendConfig::parse_url("s3::http://localhost:9000/bucket/root").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "bucket");
                assert_eq!(s3.key, Some(Path::from("root")));
                if std::env::var("AWS_ENDPOINT").is_err() {
                    assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
                }
            }
            other => panic!("expected S3, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_local_urls() {
        for (url, expected) in [
            ("/data/olist", "/data/olist"),
            ("/data/olist/", "/data/olist"),
            ("file:///data/olist", "/data/olist"),
            ("file:/data/olist", "/data/olist"),
            ("./fixtures", "./fixtures"),
        ] {
            match BackendConfig::parse_url(url).unwrap() {
                BackendConfig::Local(local) => assert_eq!(local.path, expected, "url {url}"),
                other => panic!("expected local for {url}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_invalid_url() {
        let err = BackendConfig::parse_url("ftp://example.com/data").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_local_put_get_list_delete() {
        let dir = TempDir::new().unwrap();
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        storage
            .put(&Path::from("table/a.parquet"), Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .put(&Path::from("table/b.parquet"), Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .put(&Path::from("other/c.parquet"), Bytes::from_static(b"c"))
            .await
            .unwrap();

        let bytes = storage.get("table/a.parquet").await.unwrap();
        assert_eq!(&bytes[..], b"a");

        let mut listed = storage.list_with_prefix("table").await.unwrap();
        listed.sort();
        assert_eq!(
            listed,
            vec![Path::from("table/a.parquet"), Path::from("table/b.parquet")]
        );

        let keep = Path::from("table/b.parquet");
        assert_eq!(storage.delete_prefix_except("table", &keep).await.unwrap(), 1);
        assert_eq!(storage.list_with_prefix("table").await.unwrap(), vec![keep]);
        assert_eq!(storage.list_with_prefix("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let err = storage.get("absent.csv").await.unwrap_err();
        assert!(err.is_not_found());
        let keep = Path::from("never-written/x");
        assert_eq!(
            storage
                .delete_prefix_except("never-written", &keep)
                .await
                .unwrap(),
            0
        );
    }
}
