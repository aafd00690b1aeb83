//! Text rendering of messages.
//!
//! Besides its text parts, an assistant message may show:
//!
//! - `Found N location(s):` and a numbered list, when the location tool
//!   returned features and no rating was looked up in the same message;
//! - a rating summary, unless the model's text already mentions the rating;
//! - `No locations found.` when the location tool returned nothing;
//! - `...` while the reply is in flight and nothing else is visible.

use serde_json::Value;
use waymark_places::{FeatureCollection, LocationFeature, ReviewData, ReviewResult};

use crate::reducer::{Message, Part, Role};
use crate::{LOCATION_TOOL, MAX_MAP_FEATURES, RATING_TOOL};

/// Placeholder for an in-flight reply with nothing to show yet.
pub const PLACEHOLDER: &str = "...";

/// Shown when a location search returned no features.
pub const NO_LOCATIONS: &str = "No locations found.";

/// The segments to display for `message`, text parts first.
///
/// `in_flight` marks the assistant message currently being streamed.
pub fn render_message(message: &Message, in_flight: bool) -> Vec<String> {
    let mut segments: Vec<String> = message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect();
    segments.extend(extras(message));
    if in_flight && message.role == Role::Assistant && segments.is_empty() {
        segments.push(PLACEHOLDER.to_owned());
    }
    segments
}

/// The tool-derived segments of an assistant message.
pub fn extras(message: &Message) -> Vec<String> {
    if message.role != Role::Assistant {
        return Vec::new();
    }

    let locations = message
        .parts
        .iter()
        .find_map(|p| p.output_of(LOCATION_TOOL).and_then(FeatureCollection::features_from_output));
    let rating = message
        .parts
        .iter()
        .find_map(|p| p.output_of(RATING_TOOL).and_then(successful_rating));

    let mut out = Vec::new();
    match (&locations, &rating) {
        (Some(features), None) if !features.is_empty() => out.push(location_list(features)),
        (Some(_), None) => out.push(NO_LOCATIONS.to_owned()),
        _ => {}
    }
    if let Some(data) = &rating {
        let text = message.text();
        if !text.contains("Rating:") && !text.contains('⭐') {
            out.push(rating_summary(data));
        }
    }
    out
}

fn successful_rating(output: &Value) -> Option<ReviewData> {
    let result: ReviewResult = serde_json::from_value(output.clone()).ok()?;
    if result.success { result.data } else { None }
}

/// `Found N location(s):` followed by up to 10 numbered names.
pub fn location_list(features: &[LocationFeature]) -> String {
    let count = features.len();
    let mut out = format!(
        "Found {count} location{}:",
        if count == 1 { "" } else { "s" }
    );
    for (i, feature) in features.iter().take(MAX_MAP_FEATURES).enumerate() {
        let position = i + 1;
        match feature.name() {
            Some(name) if !name.is_empty() => out.push_str(&format!("\n{position}. {name}")),
            _ => out.push_str(&format!("\n{position}. Location {position}")),
        }
    }
    if count > MAX_MAP_FEATURES {
        out.push_str(&format!("\n... and {} more", count - MAX_MAP_FEATURES));
    }
    out
}

/// Name, address and rating of a place.
pub fn rating_summary(data: &ReviewData) -> String {
    let mut out = if data.name.is_empty() {
        "Location".to_owned()
    } else {
        data.name.clone()
    };
    if let Some(address) = &data.address {
        out.push_str(&format!("\n📍 {address}"));
    }
    if let Some(rating) = data.rating {
        out.push_str(&format!("\n⭐ Rating: {rating}/5"));
    }
    if let Some(count) = data.user_rating_count {
        out.push_str(&format!(" ({} reviews)", thousands(count)));
    }
    out
}

/// Formats `n` with comma thousands separators.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
