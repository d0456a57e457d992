//! Streaming retrieval API: emit assets as their retrieval settles.
//!
//! The eager entry points in [`crate::extract`] return only once the artifact
//! is assembled. [`retrieve_stream`] instead yields `(Asset, RetrievalResult)`
//! pairs in completion order, for callers that want to package or display
//! assets themselves. Sort by `asset.ordinal` if order matters.

use crate::asset::{Asset, RetrievalResult};
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::pipeline::fetch::ResilientFetcher;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-asset outcomes.
pub type AssetStream = Pin<Box<dyn Stream<Item = (Asset, RetrievalResult)> + Send>>;

/// Resolve `input`, locate its assets and stream their retrieval.
///
/// # Returns
/// - `Ok(AssetStream)` — one item per located asset, in completion order
/// - `Err(ExtractError)` — input could not be resolved, or no assets found
///
/// # Example
/// ```rust,no_run
/// use gallery2pdf::{retrieve_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let mut assets = retrieve_stream("https://www.behance.net/gallery/1/x", &config).await?;
/// while let Some((asset, result)) = assets.next().await {
///     match result {
///         Ok(payload) => println!("{}: {} bytes", asset.filename, payload.len()),
///         Err(e) => eprintln!("{}: {}", asset.filename, e),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn retrieve_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<AssetStream, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming retrieval: {}", input_str);

    let doc = input::resolve_input(input_str, None, config).await?;
    Extractor::new(config.clone())?.retrieve_stream(&doc)
}

/// Fan out `fetcher` over `assets`, at most `limit` in flight.
pub(crate) fn fetch_all(assets: Vec<Asset>, fetcher: ResilientFetcher, limit: usize) -> AssetStream {
    let s = stream::iter(assets.into_iter().map(move |asset| {
        let fetcher = fetcher.clone();
        async move {
            let result = fetcher.fetch(&asset).await;
            (asset, result)
        }
    }))
    .buffer_unordered(limit.max(1));

    Box::pin(s)
}
