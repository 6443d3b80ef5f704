use std::sync::Arc;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use crate::api::*;
use crate::entities::{MediaLink, SpeciesFilter, TagOperation, TagUpdate};
use crate::error::{BirdError, Result};
use crate::query::build_query_string;
use crate::session::{Session, SessionStore};

#[derive(Debug)]
struct ApiConfig {
    api_url: String,
}

/// Client for the media backend. Every call carries the session's ID token.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    config: Arc<ApiConfig>,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(ApiConfig { api_url: api_url.trim_end_matches('/').to_string() }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    async fn send<S: SessionStore>(&self, session: &Session<S>, request: RequestBuilder) -> Result<String> {
        let http_response = request
            .header(AUTHORIZATION, session.bearer()?)
            .send()
            .await?;
        let status = http_response.status();
        let response_str = http_response.text().await?;
        debug!("backend responded {}", status);
        if !status.is_success() {
            warn!("backend call failed with {}: {}", status, response_str);
            return Err(BirdError::Http { status: status.as_u16(), body: response_str });
        }
        Ok(response_str)
    }

    async fn send_json<S: SessionStore, T: DeserializeOwned>(&self, session: &Session<S>, request: RequestBuilder) -> Result<T> {
        let response_str = self.send(session, request).await?;
        serde_json::from_str(&response_str).map_err(|e| BirdError::malformed(e.to_string()))
    }

    pub async fn search<S: SessionStore>(&self, session: &Session<S>, filter: &SpeciesFilter) -> Result<SearchResults> {
        let url = format!("{}{}", self.url(SEARCH_PATH), build_query_string(filter));
        info!("searching: {}", url);
        let response: SearchResponse = self.send_json(session, self.client.get(&url)).await?;
        let mut results = SearchResults::default();
        for raw_link in response.links {
            match MediaLink::try_from(raw_link) {
                Ok(link) => {
                    let id = results.items.len() as u64 + 1;
                    results.items.push(link.into_media_item(id));
                }
                Err(e) => {
                    warn!("skipping search link: {}", e);
                    results.rejected += 1;
                }
            }
        }
        info!("search returned {} items ({} rejected)", results.items.len(), results.rejected);
        Ok(results)
    }

    pub async fn fullsize<S: SessionStore>(&self, session: &Session<S>, thumb_url: &str) -> Result<String> {
        info!("looking up full-size file for {}", thumb_url);
        let request = self.client.get(self.url(FULLSIZE_PATH)).query(&[("thumbURL", thumb_url)]);
        let response: FullsizeResponse = self.send_json(session, request).await?;
        if response.file_url.is_empty() {
            return Err(BirdError::malformed("empty fileURL"));
        }
        Ok(response.file_url)
    }

    pub async fn manage_tags<S: SessionStore>(
        &self,
        session: &Session<S>,
        urls: &[String],
        operation: TagOperation,
        tags: &[String],
    ) -> Result<Vec<TagUpdate>> {
        if urls.is_empty() || tags.is_empty() {
            return Err(BirdError::validation("select at least one file and one tag"));
        }
        info!("{:?} {} tags on {} files", operation, tags.len(), urls.len());
        let body = ManageTagsRequest { urls, operation, tags };
        let request = self.client.post(self.url(MANAGE_TAGS_PATH)).json(&body);
        let response: ManageTagsResponse = self.send_json(session, request).await?;
        Ok(response.updated)
    }

    pub async fn subscribe<S: SessionStore>(&self, session: &Session<S>, species: &str, email: &str) -> Result<()> {
        info!("subscribing {} to {}", email, species);
        let body = SubscriptionRequest { species, email, enable_notifications: Some(true) };
        self.send(session, self.client.post(self.url(NOTIFICATIONS_PATH)).json(&body)).await?;
        Ok(())
    }

    pub async fn unsubscribe<S: SessionStore>(&self, session: &Session<S>, species: &str, email: &str) -> Result<()> {
        info!("unsubscribing {} from {}", email, species);
        let body = SubscriptionRequest { species, email, enable_notifications: None };
        self.send(session, self.client.delete(self.url(NOTIFICATIONS_PATH)).json(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use crate::entities::MediaKind;
    use crate::session::InMemorySessionStore;
    use crate::session::tests::fake_tokens;
    use crate::test_utils::serve;

    fn is_authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization")
            .and_then(|x| x.to_str().ok())
            .is_some_and(|x| x.starts_with("Bearer ") && x.len() > "Bearer ".len())
    }

    async fn search(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
        if !is_authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if params.get("species").map(|x| x.as_str()) == Some("broken") {
            return Json(json!({ "results": [] })).into_response();
        }
        Json(json!({
            "links": [
                { "fileURL": "https://b/full/wren.jpg", "thumbURL": "https://b/thumb/wren.jpg" },
                { "fileURL": "https://b/raptor.mp4" },
                { "fileURL": "https://b/thrush.mp3" },
                { "thumbURL": "https://b/thumb/orphan.jpg" },
                { "fileURL": format!("https://b/echo?{}", params.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",")) }
            ]
        })).into_response()
    }

    async fn fullsize(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let thumb = params.get("thumbURL").cloned().unwrap_or_default();
        Json(json!({ "fileURL": thumb.replace("/thumb/", "/full/") }))
    }

    async fn manage_tags(Json(body): Json<Value>) -> Json<Value> {
        let status = if body["operation"] == 1 { "added" } else { "removed" };
        let updated = body["urls"].as_array().unwrap().iter()
            .map(|url| json!({ "url": url, "status": status }))
            .collect::<Vec<_>>();
        Json(json!({ "updated": updated }))
    }

    async fn subscribe(Json(body): Json<Value>) -> axum::response::Response {
        assert_eq!(body["enableNotifications"], true);
        if body["species"] == "dodo" {
            return (StatusCode::INTERNAL_SERVER_ERROR, "no such topic").into_response();
        }
        StatusCode::OK.into_response()
    }

    async fn unsubscribe(Json(body): Json<Value>) -> StatusCode {
        assert!(body.get("enableNotifications").is_none());
        StatusCode::NO_CONTENT
    }

    pub fn backend_router() -> Router {
        Router::new()
            .route(SEARCH_PATH, get(search))
            .route(FULLSIZE_PATH, get(fullsize))
            .route(MANAGE_TAGS_PATH, post(manage_tags))
            .route(NOTIFICATIONS_PATH, post(subscribe).delete(unsubscribe))
    }

    async fn signed_in() -> Session<InMemorySessionStore> {
        let mut session = Session::open(InMemorySessionStore::default()).await.unwrap();
        session.begin(fake_tokens("user-1", "a@b.c")).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_search_maps_and_validates_links() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let filter: SpeciesFilter = [("wren", 1)].into_iter().collect();
        let results = client.search(&signed_in().await, &filter).await.unwrap();
        assert_eq!(results.rejected, 1);
        let kinds = results.items.iter().map(|x| x.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video, MediaKind::Audio, MediaKind::Audio]);
        assert_eq!(results.items[3].filename, "echo");
        assert_eq!(results.items[3].file_url.as_deref(), Some("https://b/echo?species=wren"));
    }

    #[tokio::test]
    async fn test_search_requires_session() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let session = Session::open(InMemorySessionStore::default()).await.unwrap();
        let err = client.search(&session, &SpeciesFilter::new()).await.unwrap_err();
        assert!(matches!(err, BirdError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_search_missing_links_is_malformed() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let filter: SpeciesFilter = [("broken", 1)].into_iter().collect();
        let err = client.search(&signed_in().await, &filter).await.unwrap_err();
        assert!(matches!(err, BirdError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fullsize_lookup() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let url = client.fullsize(&signed_in().await, "https://b/thumb/a b.jpg").await.unwrap();
        assert_eq!(url, "https://b/full/a b.jpg");
    }

    #[tokio::test]
    async fn test_manage_tags() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let session = signed_in().await;
        let urls = vec!["https://b/1.jpg".to_string(), "https://b/2.jpg".to_string()];
        let tags = vec!["wren,2".to_string()];
        let updated = client.manage_tags(&session, &urls, TagOperation::Add, &tags).await.unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|x| x.status == "added"));
        let err = client.manage_tags(&session, &[], TagOperation::Remove, &tags).await.unwrap_err();
        assert!(matches!(err, BirdError::Validation(_)));
    }

    #[tokio::test]
    async fn test_subscription_calls() {
        let client = ApiClient::new(&serve(backend_router()).await);
        let session = signed_in().await;
        client.subscribe(&session, "wren", "a@b.c").await.unwrap();
        client.unsubscribe(&session, "wren", "a@b.c").await.unwrap();
        let err = client.subscribe(&session, "dodo", "a@b.c").await.unwrap_err();
        assert!(matches!(err, BirdError::Http { status: 500, .. }));
    }
}
