//! An in-memory map for terminals and tests.

use std::fmt::Write as _;

use waymark_places::{LocationFeature, Position};

use super::{FitOptions, LngLatBounds, MapSurface, MarkerId};
use crate::error::MapError;

/// A marker placed on a [`TerminalMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalMarker {
    /// Marker identity.
    pub id: MarkerId,
    /// Where it is.
    pub position: Position,
    /// Popup label.
    pub label: String,
}

/// A [`MapSurface`] that records state instead of drawing it.
#[derive(Debug, Default)]
pub struct TerminalMap {
    style_loaded: bool,
    released: bool,
    next_marker: u64,
    markers: Vec<TerminalMarker>,
    polygon_source: Vec<LocationFeature>,
    viewport: Option<(LngLatBounds, FitOptions)>,
    fit_count: usize,
    /// Markers still accepted before the next `add_marker` fails.
    marker_budget: Option<usize>,
}

impl TerminalMap {
    /// A map whose style is already loaded.
    pub fn new() -> Self {
        Self {
            style_loaded: true,
            ..Self::default()
        }
    }

    /// A map whose style is still loading.
    pub fn loading() -> Self {
        Self::default()
    }

    /// Marks the style as loaded.
    pub fn finish_loading(&mut self) {
        self.style_loaded = true;
    }

    /// Removes a marker behind the synchronizer's back, as a user closing
    /// it would.
    pub fn detach(&mut self, marker: MarkerId) {
        self.markers.retain(|m| m.id != marker);
    }

    /// Makes `add_marker` fail once after `count` more markers, as a lost
    /// rendering context would.
    pub fn fail_after_markers(&mut self, count: usize) {
        self.marker_budget = Some(count);
    }

    /// Markers in creation order.
    pub fn markers(&self) -> &[TerminalMarker] {
        &self.markers
    }

    /// Contents of the polygon source.
    pub fn polygon_source(&self) -> &[LocationFeature] {
        &self.polygon_source
    }

    /// The last fitted bounds.
    pub fn viewport(&self) -> Option<(LngLatBounds, FitOptions)> {
        self.viewport
    }

    /// How many times the viewport was fitted.
    pub fn fit_count(&self) -> usize {
        self.fit_count
    }

    /// Whether [`MapSurface::release`] was called.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// A short multi-line description of what the map shows.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[map] {} marker(s), {} area(s)",
            self.markers.len(),
            self.polygon_source.len()
        );
        for marker in &self.markers {
            let _ = write!(
                out,
                "\n  • {} ({:.5}, {:.5})",
                marker.label, marker.position.lat, marker.position.lng
            );
        }
        for feature in &self.polygon_source {
            let _ = write!(out, "\n  ▢ {}", feature.name().unwrap_or(super::DEFAULT_LABEL));
        }
        if let Some((bounds, options)) = &self.viewport {
            let center = bounds.center();
            let _ = write!(
                out,
                "\n  viewport centred on ({:.5}, {:.5}), max zoom {}",
                center.lat, center.lng, options.max_zoom
            );
        }
        out
    }

    fn ensure_live(&self) -> Result<(), MapError> {
        if self.released {
            Err(MapError::Released)
        } else {
            Ok(())
        }
    }
}

impl MapSurface for TerminalMap {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn add_marker(&mut self, position: Position, label: &str) -> Result<MarkerId, MapError> {
        self.ensure_live()?;
        match self.marker_budget {
            Some(0) => {
                self.marker_budget = None;
                return Err(MapError::Surface("rendering context lost".into()));
            }
            Some(left) => self.marker_budget = Some(left - 1),
            None => {}
        }
        self.next_marker += 1;
        let id = MarkerId(self.next_marker);
        self.markers.push(TerminalMarker {
            id,
            position,
            label: label.to_owned(),
        });
        Ok(id)
    }

    fn remove_marker(&mut self, marker: MarkerId) -> Result<(), MapError> {
        self.ensure_live()?;
        let before = self.markers.len();
        self.markers.retain(|m| m.id != marker);
        if self.markers.len() == before {
            return Err(MapError::MarkerDetached(marker));
        }
        Ok(())
    }

    fn set_polygon_source(&mut self, features: &[LocationFeature]) -> Result<(), MapError> {
        self.ensure_live()?;
        self.polygon_source = features.to_vec();
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions) -> Result<(), MapError> {
        self.ensure_live()?;
        self.viewport = Some((bounds, options));
        self.fit_count += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.markers.clear();
        self.polygon_source.clear();
        self.released = true;
    }
}
