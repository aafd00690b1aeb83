//! Geodata adapters for waymark.
//!
//! Two independent request/response wrappers around external providers:
//!
//! - [`LocationSearch`] resolves a place or brand name to a
//!   [`FeatureCollection`] using a Nominatim-compatible `/search` endpoint.
//! - [`RatingLookup`] fetches the review rating of the best match for a
//!   name using the Places `places:searchText` endpoint. It never fails:
//!   every problem is folded into a [`ReviewResult`] with `success: false`.
//!
//! Neither adapter retries. Each call returns a terminal outcome once.

#![warn(missing_docs)]

mod error;
pub mod geojson;
mod location;
mod rating;

pub use error::PlacesError;
pub use geojson::{FeatureCollection, Geometry, LocationFeature, Position, Shape};
pub use location::{LocationSearch, LocationSearchConfig};
pub use rating::{RatingConfig, RatingLookup, ReviewData, ReviewResult};
