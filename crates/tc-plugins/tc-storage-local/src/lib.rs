//! # tc-storage-local
//! tanicare/crates/tc-plugins/tc-storage-local/src/lib.rs
//! Local filesystem implementation of `ObjectStorage`.
//! Features: Content-addressable storage and directory sharding.

use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tc_core::traits::ObjectStorage;
use tokio::fs;
use tracing::{debug, info};

pub struct LocalObjectStorage {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalObjectStorage {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Relative object key: "bucket/prefix/ab/cd/<hash>.<ext>"
    fn object_key(bucket: &str, prefix: &str, hash: &str, ext: &str) -> String {
        format!("{bucket}/{prefix}/{}/{}/{hash}.{ext}", &hash[0..2], &hash[2..4])
    }
}

/// Bucket and prefix segments may only contain `[A-Za-z0-9_-]`, separated by `/`.
fn check_segments(what: &str, value: &str) -> anyhow::Result<()> {
    let valid = !value.is_empty()
        && value.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if !valid {
        bail!("invalid {what} {value:?}");
    }
    Ok(())
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    /// Saves an upload using its SHA-256 hash as the filename.
    /// Identical uploads under the same prefix share one file.
    async fn upload(
        &self,
        bucket: &str,
        prefix: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String> {
        check_segments("bucket", bucket)?;
        check_segments("prefix", prefix)?;

        let hash = hex::encode(Sha256::digest(&data));
        let key = Self::object_key(bucket, prefix, &hash, extension_for(content_type));
        let target_path = self.root_path.join(&key);

        if fs::try_exists(&target_path).await? {
            debug!(%key, "Upload already stored");
        } else {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&target_path, &data)
                .await
                .with_context(|| format!("writing {}", target_path.display()))?;
            info!(%key, bytes = data.len(), "Upload stored");
        }

        Ok(format!("{}/{}", self.url_prefix, key))
    }
}
