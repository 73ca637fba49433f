mod cli_provider;
mod types;
pub mod cache;
pub mod file;
pub mod gather;

pub use cli_provider::CliAnalysisProvider;
pub use file::AnalysisFile;
pub use gather::{gather_evidence, Evidence, GatherOptions};
pub use types::{ProviderError, RawAnalysisPayload};

use crate::error::Result;
use crate::scanner::ImageInfo;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Vision provider: one image in, one raw payload out
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider identifier, recorded in caches and analysis files
    fn name(&self) -> &str;

    /// Analyze one image
    ///
    /// # Returns
    /// * `Ok(RawAnalysisPayload)` - unparsed provider answer
    /// * `Err(ProviderError::Transient)` - worth retrying
    /// * `Err(ProviderError::Permanent)` - the image becomes unavailable
    async fn analyze(&self, image: &ImageInfo) -> std::result::Result<RawAnalysisPayload, ProviderError>;
}

/// Gather evidence, serving already analysed images from the folder's cache
///
/// Successful new payloads are added to the cache, which is saved even
/// when some images failed.
pub async fn gather_with_cache<P>(
    provider: &P,
    images: &[ImageInfo],
    folder: &Path,
    options: &GatherOptions,
    cancel: &CancellationToken,
) -> Result<Evidence>
where
    P: AnalysisProvider + ?Sized,
{
    let mut cache = cache::CacheFile::load(folder);
    let (cached, uncached) = cache::filter_cached_images(images, &cache);

    info!(cached = cached.len(), to_analyze = uncached.len(), "cache lookup");

    let to_analyze: Vec<ImageInfo> = uncached.iter().map(|(img, _)| img.clone()).collect();
    let mut evidence = gather_evidence(provider, &to_analyze, options, cancel).await?;

    for (img, hash) in &uncached {
        if hash.is_empty() {
            continue;
        }
        if let Some(Ok(payload)) = evidence.get(&img.file_name) {
            let file_size = std::fs::metadata(&img.path).map(|m| m.len()).unwrap_or(0);
            cache.insert(hash.clone(), img.file_name.clone(), file_size, provider.name(), payload.body.clone());
        }
    }
    cache.save(folder)?;

    for payload in cached {
        evidence.insert(payload.image_id.clone(), Ok(payload));
    }

    Ok(evidence)
}
