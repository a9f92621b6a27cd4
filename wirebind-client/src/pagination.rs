//! Lazy page and item streams over offset-paginated list operations.
//!
//! A list operation's output implements [`Page`], exposing its continuation
//! link and its items; its input implements [`PageRequest`], producing the
//! input for a given offset. The offset of the next page is read from the
//! continuation link's query string (`offset` unless the operation's
//! [`PaginationConfig`](crate::PaginationConfig) names another parameter).
//!
//! Streams fetch nothing until polled, fetch one page per poll, and stop
//! after the first page without a usable link or after the first failure.

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::OperationClient;
use crate::failure::Outcome;

/// A decoded page of a list operation.
pub trait Page {
    /// Element type.
    type Item;

    /// The continuation link (absolute or relative), if there is a next page.
    fn next_link(&self) -> Option<&str>;

    /// Consume the page into its elements.
    fn into_items(self) -> Vec<Self::Item>;
}

/// The input of a list operation.
pub trait PageRequest: Sized {
    /// This input, positioned at `offset`.
    fn with_offset(&self, offset: u64) -> Self;
}

impl<I, O> OperationClient<I, O>
where
    I: Serialize + PageRequest + Send + Sync + 'static,
    O: DeserializeOwned + Page + Send + 'static,
{
    /// Stream pages, starting with `input`.
    ///
    /// A failed page is yielded as an error and ends the stream.
    pub fn pages(&self, input: I) -> impl Stream<Item = Outcome<O>> + Send + use<I, O> {
        let param = self
            .operation()
            .pagination()
            .cloned()
            .unwrap_or_default()
            .offset_param;
        let client = self.clone();

        stream::unfold(Some(input), move |cursor| {
            let client = client.clone();
            let param = param.clone();
            async move {
                let Some(input) = cursor else {
                    return None;
                };
                match client.call(&input).await {
                    Ok(page) => {
                        let next = page
                            .next_link()
                            .and_then(|link| next_offset(link, &param))
                            .map(|offset| input.with_offset(offset));
                        if next.is_none() {
                            tracing::debug!(operation = client.operation().name(), "Reached last page");
                        }
                        Some((Ok(page), next))
                    }
                    Err(failure) => Some((Err(failure), None)),
                }
            }
        })
    }

    /// Stream the elements of every page, starting with `input`.
    pub fn items(&self, input: I) -> impl Stream<Item = Outcome<O::Item>> + Send + use<I, O>
    where
        O::Item: Send,
    {
        self.pages(input).flat_map(|page| {
            let items = match page {
                Ok(page) => page.into_items().into_iter().map(Ok).collect(),
                Err(failure) => vec![Err(failure)],
            };
            stream::iter(items)
        })
    }
}

/// Parse the offset parameter out of a continuation link.
pub(crate) fn next_offset(link: &str, param: &str) -> Option<u64> {
    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://relative.invalid/").ok()?.join(link).ok()?
        }
        Err(_) => return None,
    };
    url.query_pairs()
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| value.parse().ok())
}
