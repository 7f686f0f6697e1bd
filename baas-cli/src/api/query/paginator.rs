//! Cursor-driven bulk reads
//!
//! Pages are strictly sequential: page n+1 is requested only once page n's
//! cursor is known. A page without a cursor (including an empty first page)
//! ends the read.

use futures::{Stream, TryStreamExt, stream};
use log::{debug, info};
use serde_json::Value;

use super::filters::Filter;
use crate::api::client::BaasClient;
use crate::api::error::ApiError;
use crate::api::models::QueryPage;
use crate::api::transport::{HttpRequest, Method};

enum Cursor {
    Start,
    Next(String),
    Exhausted,
}

/// Paginated reader bound to a client
#[derive(Debug, Clone)]
pub struct QueryPaginator<'a> {
    client: &'a BaasClient,
    page_size: usize,
}

impl<'a> QueryPaginator<'a> {
    pub fn new(client: &'a BaasClient) -> Self {
        Self {
            client,
            page_size: client.page_limit(),
        }
    }

    /// Override the client's default page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// One page request: RateLimiter, then token, then transport
    pub async fn fetch_page(
        &self,
        collection: &str,
        ql: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<QueryPage, ApiError> {
        let endpoint = self.client.endpoint();
        let response = self
            .client
            .request_json(|token| {
                let mut url = format!("{}&limit={}", endpoint.collection_url(collection, token), limit);
                if let Some(ql) = ql {
                    url.push_str("&ql=");
                    url.push_str(&urlencoding::encode(ql));
                }
                if let Some(cursor) = cursor {
                    url.push_str("&cursor=");
                    url.push_str(&urlencoding::encode(cursor));
                }
                Ok(HttpRequest::new(Method::GET, url))
            })
            .await?;
        Ok(QueryPage::from(response))
    }

    /// Lazily pull pages until the cursor runs out
    pub fn pages(
        &self,
        collection: &str,
        filter: impl Into<Filter>,
    ) -> impl Stream<Item = Result<QueryPage, ApiError>> {
        let collection = collection.to_string();
        let ql = filter.into().to_ql();

        stream::try_unfold(Cursor::Start, move |state| {
            let collection = collection.clone();
            let ql = ql.clone();
            async move {
                let cursor = match state {
                    Cursor::Exhausted => return Ok(None),
                    Cursor::Start => None,
                    Cursor::Next(cursor) => Some(cursor),
                };
                let page = self
                    .fetch_page(&collection, ql.as_deref(), cursor.as_deref(), self.page_size)
                    .await?;
                debug!(
                    "Fetched page of {} entities from '{}' (more: {})",
                    page.entities.len(),
                    collection,
                    page.cursor.is_some()
                );
                let next = match &page.cursor {
                    Some(cursor) => Cursor::Next(cursor.clone()),
                    None => Cursor::Exhausted,
                };
                Ok(Some((page, next)))
            }
        })
    }

    /// Invoke `on_page` for every page. Stops at the first error, whether it
    /// comes from the API or from the callback. Returns the number of pages.
    pub async fn for_each<F>(&self, collection: &str, filter: impl Into<Filter>, mut on_page: F) -> Result<usize, ApiError>
    where
        F: FnMut(QueryPage) -> Result<(), ApiError>,
    {
        let mut pages = std::pin::pin!(self.pages(collection, filter));
        let mut count = 0;
        while let Some(page) = pages.try_next().await? {
            count += 1;
            on_page(page)?;
        }
        Ok(count)
    }

    /// Load the complete result set into memory
    pub async fn fetch_all(&self, collection: &str, filter: impl Into<Filter>) -> Result<Vec<Value>, ApiError> {
        let mut entities = Vec::new();
        let pages = self
            .for_each(collection, filter, |page| {
                entities.extend(page.entities);
                Ok(())
            })
            .await?;
        info!(
            "Fetched {} entities from '{}' in {} page(s)",
            entities.len(),
            collection,
            pages
        );
        Ok(entities)
    }

    /// Single-entity lookup with `limit=1`; `None` when nothing matches
    pub async fn fetch_first(&self, collection: &str, filter: impl Into<Filter>) -> Result<Option<Value>, ApiError> {
        let ql = filter.into().to_ql();
        let page = self.fetch_page(collection, ql.as_deref(), None, 1).await?;
        Ok(page.entities.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{
        MockTransport, entities_response, is_token_request, json_response, query_param, test_client, token_response,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn three_page_transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            let body = match query_param(&request.url, "cursor").as_deref() {
                None => json!({"entities": [{"uuid": "1"}, {"uuid": "2"}], "cursor": "c1"}),
                Some("c1") => json!({"entities": [{"uuid": "3"}], "cursor": "c2"}),
                Some("c2") => json!({"entities": [{"uuid": "4"}, {"uuid": "5"}]}),
                Some(other) => panic!("unexpected cursor {}", other),
            };
            Ok(json_response(200, body))
        }))
    }

    #[tokio::test]
    async fn test_fetch_all_follows_cursor() {
        let transport = three_page_transport();
        let client = test_client(transport.clone());

        let entities = client.paginator().fetch_all("users", Filter::All).await.unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e["uuid"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        let requests = transport.api_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(query_param(&requests[0].url, "cursor"), None);
        assert_eq!(query_param(&requests[1].url, "cursor").as_deref(), Some("c1"));
        assert_eq!(query_param(&requests[2].url, "cursor").as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_request_carries_limit_ql_and_token() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(entities_response(vec![]))
        }));
        let client = test_client(transport.clone());

        client
            .paginator()
            .page_size(250)
            .fetch_all("users", Filter::matching([("email", json!("a@x.com"))]))
            .await
            .unwrap();

        let requests = transport.api_requests();
        let url = &requests[0].url;
        assert!(url.starts_with("https://baas.test/acme/sandbox/users?"));
        assert_eq!(query_param(url, "access_token").as_deref(), Some("TOKEN"));
        assert_eq!(query_param(url, "limit").as_deref(), Some("250"));
        assert_eq!(
            query_param(url, "ql").as_deref(),
            Some("email%3D%27a%40x.com%27")
        );
    }

    #[tokio::test]
    async fn test_default_page_size_comes_from_client() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(entities_response(vec![]))
        }));
        let client = test_client(transport.clone());

        client.fetch_all("users", Filter::All).await.unwrap();
        let requests = transport.api_requests();
        let url = &requests[0].url;
        assert_eq!(query_param(url, "limit").as_deref(), Some("1000"));
        assert_eq!(query_param(url, "ql"), None);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_terminal() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(entities_response(vec![]))
        }));
        let client = test_client(transport.clone());

        let entities = client.fetch_all("users", Filter::All).await.unwrap();
        assert!(entities.is_empty());
        assert_eq!(transport.api_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_for_each_visits_pages_in_order() {
        let transport = three_page_transport();
        let client = test_client(transport.clone());

        let mut sizes = Vec::new();
        let pages = client
            .paginator()
            .for_each("users", "select *", |page| {
                sizes.push(page.entities.len());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(pages, 3);
        assert_eq!(sizes, vec![2, 1, 2]);
    }

    #[tokio::test]
    async fn test_for_each_stops_when_callback_fails() {
        let transport = three_page_transport();
        let client = test_client(transport.clone());

        let result = client
            .paginator()
            .for_each("users", Filter::All, |_| Err(ApiError::Validation("stop".to_string())))
            .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(transport.api_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_error_mid_stream_discards_partial_results() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            match query_param(&request.url, "cursor") {
                None => Ok(json_response(200, json!({"entities": [{"uuid": "1"}], "cursor": "c1"}))),
                Some(_) => Ok(json_response(500, json!({"error": "internal_error"}))),
            }
        }));
        let client = test_client(transport.clone());

        let result = client.fetch_all("users", Filter::All).await;
        assert!(matches!(result, Err(ApiError::Remote { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_fetch_first_returns_single_entity() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(json_response(
                200,
                json!({"entities": [{"uuid": "U1", "email": "a@x.com"}], "cursor": "ignored"}),
            ))
        }));
        let client = test_client(transport.clone());

        let first = client
            .fetch_first("users", Filter::matching([("email", json!("a@x.com"))]))
            .await
            .unwrap();
        let again = client
            .fetch_first("users", Filter::matching([("email", json!("a@x.com"))]))
            .await
            .unwrap();

        assert_eq!(first, Some(json!({"uuid": "U1", "email": "a@x.com"})));
        assert_eq!(first, again);

        let requests = transport.api_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(query_param(&requests[0].url, "limit").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_fetch_first_not_found() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(entities_response(vec![]))
        }));
        let client = test_client(transport);

        assert_eq!(client.fetch_first("users", "name='nobody'").await.unwrap(), None);
    }
}
