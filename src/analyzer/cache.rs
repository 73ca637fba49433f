//! Analysis cache
//!
//! Keyed by the SHA-256 of the image bytes so that renamed or moved images
//! are not sent to the provider twice. Only successful payloads are cached.

use super::types::RawAnalysisPayload;
use crate::error::Result;
use crate::scanner::ImageInfo;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CACHE_FILE_NAME: &str = ".analysis-cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    version: u32,
    /// Image hash → entry
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub provider: String,
    pub payload: Value,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// Load the cache; a missing, corrupt or outdated file loads empty
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %cache_path.display(), error = %e, "cache unreadable, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(cache) => {
                warn!(found = cache.version, "cache version mismatch, rebuilding");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "cache corrupt, rebuilding");
                Self::default()
            }
        }
    }

    /// Delete the cache file; `false` when there was none
    pub fn remove(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, provider: &str, payload: Value) {
        self.entries.insert(
            hash,
            CacheEntry {
                file_name,
                file_size,
                provider: provider.to_string(),
                payload,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry count per provider
    pub fn providers(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.provider.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// SHA-256 of the file contents, hex encoded
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Split images into cached payloads and images still to analyze
///
/// Uncached images carry their hash (empty when hashing failed, in which
/// case the result is not cached either).
pub fn filter_cached_images(
    images: &[ImageInfo],
    cache: &CacheFile,
) -> (Vec<RawAnalysisPayload>, Vec<(ImageInfo, String)>) {
    let hashes: Vec<Option<String>> = images
        .par_iter()
        .map(|img| match compute_file_hash(&img.path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(path = %img.path.display(), error = %e, "hash failed, image not cached");
                None
            }
        })
        .collect();

    let mut cached = Vec::new();
    let mut uncached = Vec::new();

    for (img, hash) in images.iter().zip(hashes) {
        match hash {
            Some(hash) => match cache.get(&hash) {
                Some(entry) => {
                    debug!(image_id = %img.file_name, "cache hit");
                    cached.push(RawAnalysisPayload {
                        image_id: img.file_name.clone(),
                        body: entry.payload.clone(),
                    });
                }
                None => uncached.push((img.clone(), hash)),
            },
            None => uncached.push((img.clone(), String::new())),
        }
    }

    (cached, uncached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_is_content_based() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let hash = compute_file_hash(&a).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_file_hash(&b).unwrap());
    }

    #[test]
    fn test_providers_count() {
        let mut cache = CacheFile::default();
        cache.insert("h1".into(), "a.jpg".into(), 1, "claude", Value::Null);
        cache.insert("h2".into(), "b.jpg".into(), 1, "claude", Value::Null);
        cache.insert("h3".into(), "c.jpg".into(), 1, "gemini", Value::Null);

        let counts = cache.providers();
        assert_eq!(counts["claude"], 2);
        assert_eq!(counts["gemini"], 1);
    }
}
