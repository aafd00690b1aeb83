//! Review-rating lookup against the Places `searchText` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::PlacesError;

const FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.rating,places.userRatingCount";

const MISSING_KEY: &str =
    "Places API key not configured. Set GOOGLE_PLACES_API_KEY to enable rating lookups.";

/// Configuration for [`RatingLookup`].
#[derive(Clone)]
pub struct RatingConfig {
    /// Places API key. Lookups report a configuration error without it.
    pub api_key: Option<String>,
    /// Base URL of the Places API.
    pub base_url: String,
    /// Appended to every query to scope it, e.g. `"Singapore"`.
    pub region: String,
    /// Hard deadline for one lookup; the request is cancelled when it
    /// elapses.
    pub timeout: Duration,
    /// Pre-configured HTTP client. When `None`, a new client is created.
    pub client: Option<reqwest::Client>,
}

impl std::fmt::Debug for RatingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://places.googleapis.com/v1".into(),
            region: "Singapore".into(),
            timeout: Duration::from_secs(10),
            client: None,
        }
    }
}

/// The rating of one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewData {
    /// Provider place identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    /// Display name, or the requested name when the provider has none.
    pub name: String,
    /// Formatted street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Average rating out of 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Number of ratings the average is based on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating_count: Option<u64>,
}

/// Outcome of a rating lookup. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Whether a rating was found.
    pub success: bool,
    /// The rating, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReviewData>,
    /// Why the lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReviewResult {
    fn found(data: ReviewData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    id: Option<String>,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    user_rating_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: Option<String>,
}

/// Looks up the review rating of the best match for a place name.
#[derive(Debug, Clone)]
pub struct RatingLookup {
    config: RatingConfig,
    client: reqwest::Client,
}

impl RatingLookup {
    /// Creates the adapter, reusing `config.client` when present.
    pub fn new(config: RatingConfig) -> Result<Self, PlacesError> {
        let client = match config.client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| PlacesError::Configuration(format!("HTTP client: {e}")))?,
        };
        Ok(Self { config, client })
    }

    fn search_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/places:searchText")
    }

    /// Fetches the rating of the top match for `location_name`.
    ///
    /// Never fails: a missing key, zero matches, an upstream error, a
    /// transport error or the deadline elapsing all produce a result with
    /// `success: false` and a readable `error`.
    #[instrument(skip_all, fields(location = %location_name))]
    pub async fn lookup(&self, location_name: &str) -> ReviewResult {
        let outcome = tokio::time::timeout(self.config.timeout, self.fetch(location_name)).await;
        match outcome {
            Ok(Ok(Some(data))) => ReviewResult::found(data),
            Ok(Ok(None)) => ReviewResult::failed(format!("No results found for \"{location_name}\"")),
            Ok(Err(e)) => {
                warn!(error = %e, "rating lookup failed");
                ReviewResult::failed(e.to_string())
            }
            Err(_) => {
                warn!(timeout = ?self.config.timeout, "rating lookup timed out");
                ReviewResult::failed(PlacesError::Timeout.to_string())
            }
        }
    }

    async fn fetch(&self, location_name: &str) -> Result<Option<ReviewData>, PlacesError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PlacesError::Configuration(MISSING_KEY.into()))?;

        let response = self
            .client
            .post(self.search_url())
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&json!({
                "textQuery": format!("{location_name} {}", self.config.region),
                "maxResultCount": 1,
            }))
            .send()
            .await
            .map_err(|e| PlacesError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlacesError::upstream("Places search", status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PlacesError::from_reqwest(&e))?;
        let parsed: SearchTextResponse =
            serde_json::from_str(&body).map_err(|e| PlacesError::Decode(e.to_string()))?;

        Ok(parsed.places.into_iter().next().map(|place| ReviewData {
            place_id: place.id,
            name: place
                .display_name
                .and_then(|d| d.text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| location_name.to_owned()),
            address: place.formatted_address,
            rating: place.rating,
            user_rating_count: place.user_rating_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use serde_json::Value;
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Debug, Clone)]
    struct Captured {
        api_key: Option<String>,
        field_mask: Option<String>,
        body: Value,
    }

    type Seen = Arc<Mutex<Vec<Captured>>>;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn lookup_at(base_url: String, api_key: Option<&str>, timeout: Duration) -> RatingLookup {
        RatingLookup::new(RatingConfig {
            api_key: api_key.map(Into::into),
            base_url,
            timeout,
            ..Default::default()
        })
        .unwrap()
    }

    async fn places_server(response: Value, seen: Seen) -> String {
        let router = Router::new()
            .route(
                "/places:searchText",
                post(
                    move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| {
                        let response = response.clone();
                        async move {
                            let header = |name: &str| {
                                headers
                                    .get(name)
                                    .and_then(|v| v.to_str().ok())
                                    .map(str::to_owned)
                            };
                            seen.lock().unwrap().push(Captured {
                                api_key: header("x-goog-api-key"),
                                field_mask: header("x-goog-fieldmask"),
                                body,
                            });
                            Json(response)
                        }
                    },
                ),
            )
            .with_state(seen);
        serve(router).await
    }

    #[tokio::test]
    async fn test_lookup_success_uses_top_match() {
        let seen: Seen = Arc::default();
        let base_url = places_server(
            serde_json::json!({"places": [{
                "id": "ChIJ123",
                "displayName": {"text": "Jewel Changi Airport", "languageCode": "en"},
                "formattedAddress": "78 Airport Blvd., Singapore 819666",
                "rating": 4.7,
                "userRatingCount": 81234
            }]}),
            seen.clone(),
        )
        .await;

        let result = lookup_at(base_url, Some("key-1"), Duration::from_secs(5))
            .lookup("Jewel")
            .await;

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data.place_id.as_deref(), Some("ChIJ123"));
        assert_eq!(data.name, "Jewel Changi Airport");
        assert_eq!(data.rating, Some(4.7));
        assert_eq!(data.user_rating_count, Some(81234));

        let captured = seen.lock().unwrap()[0].clone();
        assert_eq!(captured.api_key.as_deref(), Some("key-1"));
        assert_eq!(captured.field_mask.as_deref(), Some(FIELD_MASK));
        assert_eq!(captured.body["textQuery"], "Jewel Singapore");
        assert_eq!(captured.body["maxResultCount"], 1);
    }

    #[tokio::test]
    async fn test_lookup_name_falls_back_to_request() {
        let base_url = places_server(
            serde_json::json!({"places": [{"id": "x", "rating": 4.0}]}),
            Arc::default(),
        )
        .await;
        let result = lookup_at(base_url, Some("k"), Duration::from_secs(5))
            .lookup("Haji Lane")
            .await;
        assert_eq!(result.data.unwrap().name, "Haji Lane");
    }

    #[tokio::test]
    async fn test_lookup_no_results() {
        let base_url = places_server(serde_json::json!({}), Arc::default()).await;
        let result = lookup_at(base_url, Some("k"), Duration::from_secs(5))
            .lookup("Nonexistent Place 12345")
            .await;
        assert_eq!(
            result,
            ReviewResult {
                success: false,
                data: None,
                error: Some("No results found for \"Nonexistent Place 12345\"".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_lookup_missing_key_is_not_sent() {
        let seen: Seen = Arc::default();
        let base_url = places_server(serde_json::json!({}), seen.clone()).await;
        let result = lookup_at(base_url, None, Duration::from_secs(5))
            .lookup("Jewel")
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(MISSING_KEY));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_upstream_status() {
        let router = Router::new().route(
            "/places:searchText",
            post(|| async { (StatusCode::FORBIDDEN, "API key invalid").into_response() }),
        );
        let base_url = serve(router).await;
        let result = lookup_at(base_url, Some("k"), Duration::from_secs(5))
            .lookup("Jewel")
            .await;
        assert_eq!(
            result.error.as_deref(),
            Some("Places search error: 403 - API key invalid")
        );
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let router = Router::new().route(
            "/places:searchText",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({}))
            }),
        );
        let base_url = serve(router).await;
        let result = lookup_at(base_url, Some("k"), Duration::from_millis(100))
            .lookup("Jewel")
            .await;
        assert_eq!(
            result,
            ReviewResult {
                success: false,
                data: None,
                error: Some("Request timed out. Please try again.".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_lookup_transport_error() {
        // Nothing listens on port 9 on the loopback interface.
        let result = lookup_at("http://127.0.0.1:9".into(), Some("k"), Duration::from_secs(5))
            .lookup("Jewel")
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Network error"));
    }

    #[test]
    fn test_review_result_wire_shape() {
        let result = ReviewResult::found(ReviewData {
            place_id: Some("p".into()),
            name: "Jewel".into(),
            address: None,
            rating: Some(4.5),
            user_rating_count: Some(10),
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "success": true,
                "data": {"placeId": "p", "name": "Jewel", "rating": 4.5, "userRatingCount": 10}
            })
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = RatingConfig {
            api_key: Some("secret-key".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
