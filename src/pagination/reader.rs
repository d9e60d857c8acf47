//! Lazily walks a multi-page listing resource.
//!
//! A read is a [`Stream`] of [`Page`]s that issues one transport call each time the
//! next page is polled. Dropping the stream stops the read, and every call to
//! [`ResourceReader::read_all`] starts again from the first page: no cursor state
//! outlives the stream.
//!
//! The stream ends on the first of:
//!
//! * an empty page (which is not yielded),
//! * the items seen so far reaching the server's reported `found` total,
//! * the page-count hint being reached,
//! * a short page, i.e. fewer items than the requested limit,
//! * the request's `max_pages` cap.
//!
//! The last two hold regardless of what the server reports, so a read over a finite
//! resource always terminates.

use crate::pagination::page::Page;
use crate::transport::backend::HttpBackend;
use crate::transport::error::TransportError;
use crate::transport::retry::ResourceKind;
use crate::transport::throttled::ThrottledTransport;
use bon::Builder;
use futures_util::stream::{self, Stream};
use log::debug;
use serde::de::DeserializeOwned;

/// How successive pages are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// `offset` grows by `limit` per page.
    Offset,
    /// `page` counts up from 1.
    PageNumber,
}

/// Describes one listing read.
#[derive(Debug, Clone, Builder)]
pub struct PageRequest {
    pub kind: ResourceKind,
    #[builder(into)]
    pub endpoint: String,
    /// Filters sent with every page.
    #[builder(default)]
    pub params: Vec<(String, String)>,
    pub cursor: Cursor,
    pub limit: usize,
    pub max_pages: Option<u32>,
}

impl PageRequest {
    fn query_for(&self, page: u32) -> Vec<(String, String)> {
        let mut query = self.params.clone();
        query.push(("limit".to_string(), self.limit.to_string()));
        match self.cursor {
            Cursor::Offset => {
                let offset = (page as usize - 1) * self.limit;
                query.push(("offset".to_string(), offset.to_string()));
            }
            Cursor::PageNumber => query.push(("page".to_string(), page.to_string())),
        }
        query
    }
}

struct CursorState {
    request: PageRequest,
    next_page: u32,
    seen: u64,
    finished: bool,
}

pub struct ResourceReader<'a, B> {
    transport: &'a ThrottledTransport<B>,
}

impl<'a, B: HttpBackend> ResourceReader<'a, B> {
    pub fn new(transport: &'a ThrottledTransport<B>) -> Self {
        Self { transport }
    }

    /// Streams the pages of `request`, deserializing each item into `T`.
    ///
    /// A transport error is yielded once and ends the stream.
    pub fn read_all<T>(
        &self,
        request: PageRequest,
    ) -> impl Stream<Item = Result<Page<T>, TransportError>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        let transport = self.transport;
        let state = CursorState {
            request,
            next_page: 1,
            seen: 0,
            finished: false,
        };
        stream::try_unfold(state, move |state| fetch_next(transport, state))
    }
}

async fn fetch_next<B, T>(
    transport: &ThrottledTransport<B>,
    mut state: CursorState,
) -> Result<Option<(Page<T>, CursorState)>, TransportError>
where
    B: HttpBackend,
    T: DeserializeOwned,
{
    if state.finished {
        return Ok(None);
    }
    let request = &state.request;
    if request.max_pages.is_some_and(|max| state.next_page > max) {
        debug!(
            "Stopping read of {} at page cap {:?}",
            request.endpoint, request.max_pages
        );
        return Ok(None);
    }

    let query = request.query_for(state.next_page);
    let response = transport
        .call(request.kind, &request.endpoint, &query)
        .await?;
    let page: Page<T> = Page::from_payload(state.next_page, response.payload);

    if page.raw_len == 0 {
        debug!(
            "Empty page {} for {}, read complete",
            state.next_page, request.endpoint
        );
        return Ok(None);
    }

    state.seen += page.raw_len as u64;
    let reached_found = page.found.is_some_and(|found| state.seen >= found);
    let reached_page_count = page.page_count.is_some_and(|count| page.number >= count);
    let short_page = page.raw_len < request.limit;
    if reached_found || reached_page_count || short_page {
        debug!(
            "Last page {} for {} (seen {}, found {:?})",
            page.number, request.endpoint, state.seen, page.found
        );
        state.finished = true;
    }
    state.next_page += 1;
    Ok(Some((page, state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{envelope, query_param, ScriptedBackend};
    use crate::transport::backend::HttpReply;
    use crate::transport::retry::{RetryPolicy, ThrottleConfig};
    use futures_util::TryStreamExt;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: i64,
    }

    fn transport(backend: ScriptedBackend) -> ThrottledTransport<ScriptedBackend> {
        ThrottledTransport::new(
            backend,
            "https://api.test/v3",
            RetryPolicy::immediate(2, 2),
            ThrottleConfig::none(),
        )
    }

    fn items(range: std::ops::Range<i64>) -> Vec<serde_json::Value> {
        range.map(|id| json!({ "id": id })).collect()
    }

    fn request(cursor: Cursor, limit: usize) -> PageRequest {
        PageRequest::builder()
            .kind(ResourceKind::Locations)
            .endpoint("locations")
            .params(vec![("iso".to_string(), "CL".to_string())])
            .cursor(cursor)
            .limit(limit)
            .build()
    }

    #[tokio::test]
    async fn terminates_on_empty_page_without_total() -> Result<(), TransportError> {
        // Full pages forever until page 4, which is empty; no `found` reported.
        let backend = ScriptedBackend::new(|_, query| {
            let page: i64 = query_param(query, "page").unwrap().parse().unwrap();
            if page < 4 {
                Ok(envelope(items(page * 10..page * 10 + 2), None))
            } else {
                Ok(envelope(vec![], None))
            }
        });
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        let pages: Vec<Page<Item>> = reader
            .read_all(request(Cursor::PageNumber, 2))
            .try_collect()
            .await?;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].results[1].id, 31);
        assert_eq!(transport.backend().call_count(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn stops_when_found_is_reached() -> Result<(), TransportError> {
        let backend = ScriptedBackend::new(|_, query| {
            let offset: i64 = query_param(query, "offset").unwrap().parse().unwrap();
            Ok(envelope(items(offset..offset + 3), Some(6)))
        });
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        let pages: Vec<Page<Item>> = reader
            .read_all(request(Cursor::Offset, 3))
            .try_collect()
            .await?;

        assert_eq!(pages.len(), 2);
        let offsets: Vec<String> = transport
            .backend()
            .requests()
            .iter()
            .map(|r| r.param("offset").unwrap().to_string())
            .collect();
        assert_eq!(offsets, vec!["0", "3"]);
        assert!(transport
            .backend()
            .requests()
            .iter()
            .all(|r| r.param("iso") == Some("CL") && r.param("limit") == Some("3")));
        Ok(())
    }

    #[tokio::test]
    async fn short_page_ends_read() -> Result<(), TransportError> {
        let backend = ScriptedBackend::sequence(vec![
            Ok(envelope(items(0..5), Some(1_000_000))),
            Ok(envelope(items(5..7), Some(1_000_000))),
        ]);
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        let pages: Vec<Page<Item>> = reader
            .read_all(request(Cursor::Offset, 5))
            .try_collect()
            .await?;

        assert_eq!(pages.len(), 2);
        assert_eq!(transport.backend().call_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_total_is_bounded_by_page_cap() -> Result<(), TransportError> {
        // The server always returns a full page and claims a lower bound only.
        let backend = ScriptedBackend::new(|_, _| {
            Ok(HttpReply::new(
                200,
                json!({ "meta": { "found": ">1000" }, "results": [{ "id": 1 }, { "id": 2 }] })
                    .to_string(),
            ))
        });
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);
        let mut req = request(Cursor::Offset, 2);
        req.max_pages = Some(5);

        let pages: Vec<Page<Item>> = reader.read_all(req).try_collect().await?;

        assert_eq!(pages.len(), 5);
        assert_eq!(transport.backend().call_count(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn page_count_hint_ends_read() -> Result<(), TransportError> {
        let backend = ScriptedBackend::new(|_, _| {
            Ok(HttpReply::new(
                200,
                json!({ "meta": { "pageCount": 2 }, "results": [{ "id": 1 }] }).to_string(),
            ))
        });
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        let pages: Vec<Page<Item>> = reader
            .read_all(request(Cursor::PageNumber, 1))
            .try_collect()
            .await?;

        assert_eq!(pages.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let backend = ScriptedBackend::sequence(vec![
            Ok(envelope(items(0..2), None)),
            Ok(HttpReply::new(500, "boom")),
        ]);
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        let result: Result<Vec<Page<Item>>, TransportError> = reader
            .read_all(request(Cursor::PageNumber, 2))
            .try_collect()
            .await;

        assert!(matches!(
            result,
            Err(TransportError::HttpStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn restarts_from_first_page() -> Result<(), TransportError> {
        let backend = ScriptedBackend::new(|_, query| {
            let page: i64 = query_param(query, "page").unwrap().parse().unwrap();
            Ok(envelope(items(page..page + 1), Some(2)))
        });
        let transport = transport(backend);
        let reader = ResourceReader::new(&transport);

        for _ in 0..2 {
            let pages: Vec<Page<Item>> = reader
                .read_all(request(Cursor::PageNumber, 1))
                .try_collect()
                .await?;
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[0].results[0].id, 1);
        }
        assert_eq!(transport.backend().call_count(), 4);
        Ok(())
    }
}
