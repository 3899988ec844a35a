//! Disk-backed cache storage.
//!
//! Layout under the cache directory:
//!
//! ```text
//! <root>/<store name>/<sha256(key)>.entry
//! ```
//!
//! An entry file is one line of compact JSON (`CachedData<EntryMeta>`),
//! a newline, then the raw response body. The whole file is written under
//! a temporary name and renamed into place, so the rename is the only
//! commit point: a reader sees either the previous entry or the new one,
//! and concurrent writers of one key leave exactly one of their entries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use super::storage::{CacheStorage, CachedData, EntryInfo};
use crate::error::{ProxyError, ProxyResult};
use crate::http::{Response, ResponseHead};

const ENTRY_EXT: &str = "entry";

/// Infix of in-flight temp files: `<stem>.tmp-<pid>-<n>`
const TEMP_MARKER: &str = ".tmp-";

/// Distinguishes temp files of concurrent writers within this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    head: ResponseHead,
    size: u64,
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> ProxyResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(ProxyError::InvalidStoreName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn entry_path(dir: &Path, key: &str) -> PathBuf {
        let stem = hex::encode(Sha256::digest(key.as_bytes()));
        dir.join(format!("{}.{}", stem, ENTRY_EXT))
    }

    fn encode(meta: &CachedData<EntryMeta>, body: &[u8]) -> ProxyResult<Vec<u8>> {
        // Compact JSON escapes newlines inside strings, so the header is one line
        let mut contents = serde_json::to_vec(meta)?;
        contents.push(b'\n');
        contents.extend_from_slice(body);
        Ok(contents)
    }

    fn decode(contents: Vec<u8>) -> ProxyResult<(CachedData<EntryMeta>, Vec<u8>)> {
        let split = contents
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidData, "cache entry has no header"))?;
        let meta = serde_json::from_slice(&contents[..split])?;
        Ok((meta, contents[split + 1..].to_vec()))
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> ProxyResult<()> {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), n));
        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read only the header line of an entry
    async fn read_meta(path: &Path) -> ProxyResult<Option<CachedData<EntryMeta>>> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut line = Vec::new();
        BufReader::new(file).read_until(b'\n', &mut line).await?;
        // Trailing newline is whitespace to serde_json
        Ok(Some(serde_json::from_slice(&line)?))
    }

    /// Remove temp files left by writers that died before renaming.
    /// Temp files of this process may belong to a put still in flight.
    async fn sweep_temp_files(dir: &Path) -> ProxyResult<usize> {
        let own = format!("{}{}-", TEMP_MARKER, std::process::id());
        let mut entries = fs::read_dir(dir).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.contains(TEMP_MARKER) || name.contains(&own) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(file = name, error = %e, "Failed to remove stray temp file"),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> ProxyResult<()> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir).await?;
        let removed = Self::sweep_temp_files(&dir).await?;
        if removed > 0 {
            debug!(store = name, removed = removed, "Removed stray temp files");
        }
        Ok(())
    }

    async fn keys(&self) -> ProxyResult<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> ProxyResult<bool> {
        match fs::remove_dir_all(self.store_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, store: &str, key: &str) -> ProxyResult<Option<Response>> {
        let path = Self::entry_path(&self.store_dir(store)?, key);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (meta, body) = Self::decode(contents)?;
        if meta.data.key != key {
            warn!(store = store, key = key, "Cache entry hash collision, treating as miss");
            return Ok(None);
        }
        Ok(Some(Response::from_parts(meta.data.head, body)))
    }

    async fn put(&self, store: &str, key: &str, response: Response) -> ProxyResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir).await?;

        let (head, body) = response.into_parts();
        let meta = CachedData::new(EntryMeta {
            key: key.to_string(),
            head,
            size: body.len() as u64,
        });
        let contents = Self::encode(&meta, &body)?;
        Self::write_atomic(&Self::entry_path(&dir, key), &contents).await
    }

    async fn entries(&self, store: &str) -> ProxyResult<Vec<CachedData<EntryInfo>>> {
        let mut dir = match fs::read_dir(self.store_dir(store)?).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => entries.push(CachedData {
                    data: EntryInfo {
                        key: meta.data.key,
                        status: meta.data.head.status,
                        size: meta.data.size,
                    },
                    cached_at: meta.cached_at,
                }),
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }
        entries.sort_by(|a, b| a.data.key.cmp(&b.data.key));
        Ok(entries)
    }
}
