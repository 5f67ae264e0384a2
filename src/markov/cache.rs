//! Model cache
//!
//! Decides between rehydrating a persisted chain and retraining from the
//! corpus. A cached chain is reused only when its order matches the request;
//! a fresh build is persisted immediately, temp-file-then-rename so an
//! interrupted write never corrupts the cache.

use std::fs;
use std::path::Path;

use crate::corpus::load_corpus_text;
use crate::{Error, Result};

use super::{Chain, Tokenizer};

/// Where a chain came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Rehydrated from the cache file, no retraining
    Cache,
    /// Trained fresh from the corpus and written back to the cache
    Rebuilt,
}

/// Load a cached chain or rebuild one from the corpus
///
/// The corpus is read only when a rebuild is required; a cache hit never
/// touches it. A zero-byte cache file is treated the same as an absent one
/// and triggers a silent rebuild.
///
/// # Errors
///
/// Returns [`Error::CacheDecode`] if the cache file is non-empty but cannot
/// be decoded as a chain. Rebuild failures surface as corpus IO/format
/// errors.
pub fn load_or_build(
    corpus_path: &Path,
    cache_path: &Path,
    order: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<(Chain, ModelSource)> {
    match read_cached(cache_path)? {
        Some(chain) if chain.order() == order => {
            tracing::info!(
                path = %cache_path.display(),
                order,
                "reusing cached model"
            );
            return Ok((chain, ModelSource::Cache));
        }
        Some(chain) => {
            tracing::info!(
                cached_order = chain.order(),
                requested_order = order,
                "cached model order differs, retraining"
            );
        }
        None => {
            tracing::info!(path = %cache_path.display(), "no usable model cache, training");
        }
    }

    let text = load_corpus_text(corpus_path)?;
    let chain = Chain::build(&text, order, tokenizer);
    write_cache(cache_path, &chain)?;

    Ok((chain, ModelSource::Rebuilt))
}

/// Read the persisted chain, distinguishing "absent" from "malformed"
///
/// Absent and zero-byte files are `Ok(None)`; a non-empty file that fails to
/// decode is a fatal [`Error::CacheDecode`], never silently rebuilt over.
fn read_cached(cache_path: &Path) -> Result<Option<Chain>> {
    let bytes = match fs::read(cache_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.is_empty() {
        tracing::warn!(
            path = %cache_path.display(),
            "model cache is empty, treating as absent"
        );
        return Ok(None);
    }

    let chain = serde_json::from_slice(&bytes).map_err(|e| {
        Error::CacheDecode(format!("{}: {e}", cache_path.display()))
    })?;

    Ok(Some(chain))
}

fn write_cache(cache_path: &Path, chain: &Chain) -> Result<()> {
    let tmp = cache_path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(chain)?)?;
    fs::rename(&tmp, cache_path)?;
    tracing::debug!(path = %cache_path.display(), "model cache written");
    Ok(())
}
