//! Name-based location search against a Nominatim-compatible endpoint.

use std::time::Duration;

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::PlacesError;
use crate::geojson::{FeatureCollection, Geometry, LocationFeature};

/// Configuration for [`LocationSearch`].
///
/// ```rust
/// use waymark_places::LocationSearchConfig;
///
/// let config = LocationSearchConfig {
///     country_codes: "my".into(),
///     ..Default::default()
/// };
/// assert_eq!(config.limit, 10);
/// ```
#[derive(Debug, Clone)]
pub struct LocationSearchConfig {
    /// Base URL of the service; `/search` is appended.
    pub base_url: String,
    /// Comma-separated ISO 3166-1 country codes results are restricted to.
    pub country_codes: String,
    /// Maximum number of candidates requested and returned.
    pub limit: usize,
    /// Preferred language for display names.
    pub language: String,
    /// Sent as `User-Agent`; public Nominatim rejects anonymous clients.
    pub user_agent: String,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Pre-configured HTTP client. When `None`, a new client is created.
    pub client: Option<reqwest::Client>,
}

impl Default for LocationSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".into(),
            country_codes: "sg".into(),
            limit: 10,
            language: "en".into(),
            user_agent: concat!("waymark/", env!("CARGO_PKG_VERSION")).into(),
            timeout: None,
            client: None,
        }
    }
}

/// One upstream search record. Only the fields waymark uses.
#[derive(Debug, Deserialize)]
struct SearchRecord {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    geojson: Option<Geometry>,
}

/// Resolves place and brand names to located features.
#[derive(Debug, Clone)]
pub struct LocationSearch {
    config: LocationSearchConfig,
    client: reqwest::Client,
}

impl LocationSearch {
    /// Creates the adapter, reusing `config.client` when present.
    pub fn new(config: LocationSearchConfig) -> Result<Self, PlacesError> {
        let client = match config.client.clone() {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder
                    .build()
                    .map_err(|e| PlacesError::Configuration(format!("HTTP client: {e}")))?
            }
        };
        Ok(Self { config, client })
    }

    fn search_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/search")
    }

    /// Searches for `query` within the configured region.
    ///
    /// Returns at most `limit` features in provider rank order. Each
    /// feature's `properties.name` is the provider display name and its
    /// geometry is the provider's GeoJSON, unchanged. Records without a
    /// geometry are dropped.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn search(&self, query: &str) -> Result<FeatureCollection, PlacesError> {
        let limit = self.config.limit.to_string();
        let response = self
            .client
            .get(self.search_url())
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("polygon_geojson", "1"),
                ("limit", limit.as_str()),
                ("countrycodes", self.config.country_codes.as_str()),
                ("accept-language", self.config.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlacesError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlacesError::upstream("Location search", status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PlacesError::from_reqwest(&e))?;
        let records: Vec<SearchRecord> =
            serde_json::from_str(&body).map_err(|e| PlacesError::Decode(e.to_string()))?;

        let features = records
            .into_iter()
            .take(self.config.limit)
            .filter_map(|record| match record.geojson {
                Some(geometry) => Some(LocationFeature::new(geometry, record.display_name)),
                None => {
                    warn!(name = %record.display_name, "dropping search record without geometry");
                    None
                }
            })
            .collect();

        Ok(FeatureCollection { features })
    }
}
