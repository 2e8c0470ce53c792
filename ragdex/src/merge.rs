//! First-available merge of several fallible streams.
//!
//! Used to ingest from many document sources at once: whichever source has
//! a document ready is served first.

use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::error::Result;

/// Poll every source concurrently and yield items as they become ready.
///
/// - Items from one source keep that source's order.
/// - A source that ends is dropped from the poll set.
/// - A source that yields an error is logged and dropped while another source
///   is still live or has already finished cleanly.
/// - When every source has failed, the last error is yielded. With a single
///   source this means its error is always yielded.
///
/// # Example
///
/// ```rust,ignore
/// use futures::StreamExt;
/// use ragdex::merge_as_available;
///
/// let mut merged = merge_as_available(vec![rss.boxed(), sitemap.boxed()]);
/// while let Some(doc) = merged.next().await {
///     index_document(doc?).await?;
/// }
/// ```
pub fn merge_as_available<T>(
    sources: Vec<BoxStream<'static, Result<T>>>,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut pending: FuturesUnordered<_> =
            sources.into_iter().enumerate().map(|(i, s)| next_from(i, s)).collect();
        let mut finished_cleanly = 0usize;

        while let Some((source, item, rest)) = pending.next().await {
            match item {
                Some(Ok(value)) => {
                    pending.push(next_from(source, rest));
                    yield Ok(value);
                }
                Some(Err(e)) if pending.is_empty() && finished_cleanly == 0 => {
                    warn!(source, error = %e, "every source failed");
                    yield Err(e);
                }
                Some(Err(e)) => {
                    warn!(source, error = %e, "source failed, dropping it");
                }
                None => {
                    finished_cleanly += 1;
                    debug!(source, "source exhausted");
                }
            }
        }
    })
}

async fn next_from<T>(
    source: usize,
    mut stream: BoxStream<'static, Result<T>>,
) -> (usize, Option<Result<T>>, BoxStream<'static, Result<T>>) {
    let item = stream.next().await;
    (source, item, stream)
}
