use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{upstream_error, DocshareError};

// Object store keeps document bytes under opaque keys. Objects are never
// handed out directly: clients get a presigned url that is checked by
// the `/objects` route.

const SIGNING_CONTEXT: &str = "docshare 2024-11 presigned object urls";

pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DocshareError>;

    async fn get(&self, key: &str) -> Result<StoredObject, DocshareError>;

    async fn delete(&self, key: &str) -> Result<(), DocshareError>;

    /// Time-limited url that retrieves the object without further checks
    fn presign(&self, key: &str, ttl: Duration) -> Result<String, DocshareError>;
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "kind")]
pub enum ObjectStoreConfig {
    Fs { root: PathBuf },
    Memory,
}

/// Replaces every character outside `[A-Za-z0-9._-]` so that a file name
/// can be used as one key segment.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    sanitized.trim_start_matches('.').to_string()
}

/// Keys are `{owner_id}/{uuid}-{file_name}`
pub fn document_key(owner_id: uuid::Uuid, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        owner_id,
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

/// Rejects keys that could escape the store root
pub fn validate_key(key: &str) -> Result<(), DocshareError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment.chars().all(|c| {
                    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
                })
        });
    if valid {
        Ok(())
    } else {
        Err(DocshareError::bad_request("Invalid object key"))
    }
}

/// Signs object urls with a keyed blake3 hash over the key and the expiry.
#[derive(Clone)]
pub struct UrlSigner {
    key: [u8; 32],
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: &str, base_url: &str) -> Self {
        Self {
            key: blake3::derive_key(SIGNING_CONTEXT, secret.as_bytes()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> blake3::Hash {
        let message = format!("{}\n{}", key, expires);
        blake3::keyed_hash(&self.key, message.as_bytes())
    }

    pub fn sign(&self, key: &str, expires: i64) -> String {
        self.mac(key, expires).to_hex().to_string()
    }

    pub fn url(&self, key: &str, ttl: Duration) -> String {
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        format!(
            "{}/objects/{}?expires={}&signature={}",
            self.base_url,
            key,
            expires,
            self.sign(key, expires)
        )
    }

    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), DocshareError> {
        let Ok(given) = blake3::Hash::from_hex(signature) else {
            return Err(DocshareError::forbidden("Invalid signature"));
        };
        // blake3::Hash comparison is constant time
        if given != self.mac(key, expires) {
            return Err(DocshareError::forbidden("Invalid signature"));
        }
        if now > expires {
            return Err(DocshareError::forbidden("Url expired"));
        }
        Ok(())
    }
}

pub struct FsObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsObjectStore {
    pub fn new(root: PathBuf, signer: UrlSigner) -> Self {
        Self { root, signer }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, DocshareError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn content_type_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".content-type");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DocshareError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(upstream_error)?;
        }
        tokio::fs::write(&path, data).await.map_err(upstream_error)?;
        tokio::fs::write(Self::content_type_path(&path), content_type)
            .await
            .map_err(upstream_error)?;
        log::trace!("objects: stored {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, DocshareError> {
        let path = self.object_path(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocshareError::not_found("Object not found"));
            }
            Err(err) => return Err(upstream_error(err)),
        };
        let content_type =
            tokio::fs::read_to_string(Self::content_type_path(&path))
                .await
                .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(StoredObject { data, content_type })
    }

    async fn delete(&self, key: &str) -> Result<(), DocshareError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(upstream_error(err)),
        }
        _ = tokio::fs::remove_file(Self::content_type_path(&path)).await;
        Ok(())
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String, DocshareError> {
        validate_key(key)?;
        Ok(self.signer.url(key, ttl))
    }
}

pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            signer,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DocshareError> {
        validate_key(key)?;
        let mut objects = self.objects.lock().await;
        objects.insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, DocshareError> {
        let objects = self.objects.lock().await;
        match objects.get(key) {
            Some((data, content_type)) => Ok(StoredObject {
                data: data.clone(),
                content_type: content_type.clone(),
            }),
            None => Err(DocshareError::not_found("Object not found")),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), DocshareError> {
        let mut objects = self.objects.lock().await;
        objects.remove(key);
        Ok(())
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String, DocshareError> {
        validate_key(key)?;
        Ok(self.signer.url(key, ttl))
    }
}
