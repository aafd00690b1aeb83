//! The two capabilities offered to the model.
//!
//! | Tool | Input | Output |
//! |------|-------|--------|
//! | `search_location` | `{query}` | GeoJSON `FeatureCollection` |
//! | `get_review_rating` | `{locationName}` | `{success, data?, error?}` |
//!
//! Input schemas are generated from the input structs below.

use std::sync::Arc;

use schemars::JsonSchema as DeriveJsonSchema;
use serde::Deserialize;
use serde_json::Value;
use waymark_core::tool::{ToolError, ToolRegistry, tool_fn};
use waymark_core::{JsonSchema, ToolDefinition};
use waymark_places::{LocationSearch, RatingLookup};

/// Name of the location search tool.
pub const SEARCH_LOCATION: &str = "search_location";

/// Name of the review-rating tool.
pub const GET_REVIEW_RATING: &str = "get_review_rating";

const SEARCH_LOCATION_DESCRIPTION: &str = "Search for a location name, address, landmark, or place \
and return GeoJSON data to display on the map. Only use this tool when the user wants to know about \
specific location(s) on the map. Do NOT use for generic queries like food types or categories.";

const GET_REVIEW_RATING_DESCRIPTION: &str = "Get Google review ratings and review count for a \
specific location using the Google Places API. Use this when the user asks about ratings, reviews, \
or what people say about a place.";

/// Arguments of `search_location`.
#[derive(Debug, Clone, Deserialize, DeriveJsonSchema)]
pub struct SearchLocationInput {
    /// A specific location name, address, landmark, or place to search for.
    /// Do NOT use for generic terms like "japanese food" or "cafes".
    pub query: String,
}

/// Arguments of `get_review_rating`.
#[derive(Debug, Clone, Deserialize, DeriveJsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    /// The name of the location to get review ratings for (e.g. "Marina Bay
    /// Sands", "Orchard Road", "Sentosa").
    pub location_name: String,
}

/// Builds the registry holding both tools.
///
/// Location search failures become error tool results carrying the
/// adapter's message. Rating lookups never fail; their `{success: false}`
/// outcomes are ordinary output.
pub fn build_registry(
    search: LocationSearch,
    rating: RatingLookup,
) -> Result<ToolRegistry, serde_json::Error> {
    let search = Arc::new(search);
    let rating = Arc::new(rating);
    let mut registry = ToolRegistry::new();

    registry.register(tool_fn(
        ToolDefinition {
            name: SEARCH_LOCATION.into(),
            description: SEARCH_LOCATION_DESCRIPTION.into(),
            parameters: JsonSchema::from_type::<SearchLocationInput>()?,
        },
        move |input: Value| {
            let search = Arc::clone(&search);
            async move {
                let input: SearchLocationInput = serde_json::from_value(input)?;
                let collection = search
                    .search(&input.query)
                    .await
                    .map_err(|e| ToolError::new(e.to_string()))?;
                Ok::<_, ToolError>(serde_json::to_value(collection)?)
            }
        },
    ));

    registry.register(tool_fn(
        ToolDefinition {
            name: GET_REVIEW_RATING.into(),
            description: GET_REVIEW_RATING_DESCRIPTION.into(),
            parameters: JsonSchema::from_type::<RatingInput>()?,
        },
        move |input: Value| {
            let rating = Arc::clone(&rating);
            async move {
                let input: RatingInput = serde_json::from_value(input)?;
                let result = rating.lookup(&input.location_name).await;
                Ok::<_, ToolError>(serde_json::to_value(result)?)
            }
        },
    ));

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use serde_json::json;
    use tokio::net::TcpListener;
    use waymark_core::ToolCall;
    use waymark_places::{LocationSearchConfig, RatingConfig};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn registry_at(search_url: String) -> ToolRegistry {
        let search = LocationSearch::new(LocationSearchConfig {
            base_url: search_url,
            ..Default::default()
        })
        .unwrap();
        let rating = RatingLookup::new(RatingConfig::default()).unwrap();
        build_registry(search, rating).unwrap()
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn test_schemas_from_input_types() {
        let registry = registry_at("http://127.0.0.1:9".into());
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);

        let rating = &defs[0];
        assert_eq!(rating.name, GET_REVIEW_RATING);
        assert_eq!(
            rating.parameters.as_value()["required"],
            json!(["locationName"])
        );

        let search = &defs[1];
        assert_eq!(search.name, SEARCH_LOCATION);
        assert_eq!(search.parameters.as_value()["required"], json!(["query"]));
        assert!(
            search.parameters.as_value()["properties"]["query"]["description"]
                .as_str()
                .unwrap()
                .contains("japanese food")
        );
    }

    #[tokio::test]
    async fn test_search_location_returns_feature_collection() {
        let router = Router::new().route(
            "/search",
            get(|| async {
                Json(json!([{
                    "display_name": "Merlion Park",
                    "geojson": {"type": "Point", "coordinates": [103.8545, 1.2868]}
                }]))
            }),
        );
        let registry = registry_at(serve(router).await);

        let result = registry
            .execute(&call(SEARCH_LOCATION, json!({"query": "Merlion Park"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content["type"], "FeatureCollection");
        assert_eq!(
            result.content["features"][0]["properties"]["name"],
            "Merlion Park"
        );
    }

    #[tokio::test]
    async fn test_search_location_failure_is_error_result() {
        let router = Router::new().route(
            "/search",
            get(|| async { (StatusCode::BAD_GATEWAY, "down").into_response() }),
        );
        let registry = registry_at(serve(router).await);

        let result = registry
            .execute(&call(SEARCH_LOCATION, json!({"query": "Jewel"})))
            .await;
        assert!(result.is_error);
        assert_eq!(result.content_text(), "Location search error: 502 - down");
    }

    #[tokio::test]
    async fn test_rating_without_key_is_unsuccessful_output() {
        let registry = registry_at("http://127.0.0.1:9".into());

        let result = registry
            .execute(&call(
                GET_REVIEW_RATING,
                json!({"locationName": "Marina Bay Sands"}),
            ))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content["success"], false);
        assert!(
            result.content["error"]
                .as_str()
                .unwrap()
                .starts_with("Places API key not configured")
        );
    }

    #[tokio::test]
    async fn test_wrong_argument_name_rejected() {
        let registry = registry_at("http://127.0.0.1:9".into());
        let result = registry
            .execute(&call(GET_REVIEW_RATING, json!({"location_name": "Jewel"})))
            .await;
        assert!(result.is_error);
        assert!(result.content_text().starts_with("Invalid arguments"));
    }
}
