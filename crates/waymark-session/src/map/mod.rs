//! Reconciles a feature list against a live map.
//!
//! The concrete map is hidden behind [`MapSurface`]; the
//! [`MapSynchronizer`] owns it exclusively and is the only thing that
//! mutates it. One reconciliation pass:
//!
//! 1. skips lists equal to the last one applied,
//! 2. defers the list until the base style has loaded,
//! 3. clears the markers and polygon source of the previous pass,
//! 4. adds a labelled marker per `Point` and batches every other geometry
//!    into one polygon source update,
//! 5. fits the viewport around every accumulated coordinate.

mod terminal;

use std::fmt;
use std::time::Duration;

use tracing::debug;
use waymark_places::{LocationFeature, Position};

use crate::error::MapError;

pub use terminal::{TerminalMap, TerminalMarker};

/// Label used for features without a name.
pub const DEFAULT_LABEL: &str = "Location";

/// Identifies a marker on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An axis-aligned longitude/latitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl LngLatBounds {
    /// A zero-size box at `position`.
    pub fn at(position: Position) -> Self {
        Self {
            west: position.lng,
            south: position.lat,
            east: position.lng,
            north: position.lat,
        }
    }

    /// Grows the box to include `position`.
    pub fn extend(&mut self, position: Position) {
        self.west = self.west.min(position.lng);
        self.south = self.south.min(position.lat);
        self.east = self.east.max(position.lng);
        self.north = self.north.max(position.lat);
    }

    /// The centre of the box.
    pub fn center(&self) -> Position {
        Position {
            lng: (self.west + self.east) / 2.0,
            lat: (self.south + self.north) / 2.0,
        }
    }
}

/// How the viewport is fitted to new bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Pixels kept free around the bounds.
    pub padding: u32,
    /// The fit never zooms in further than this.
    pub max_zoom: f64,
    /// Length of the camera animation.
    pub duration: Duration,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: 50,
            max_zoom: 15.0,
            duration: Duration::from_millis(1000),
        }
    }
}

/// The operations the synchronizer needs from a concrete map.
pub trait MapSurface {
    /// Whether the base style is ready to receive markers and sources.
    fn is_style_loaded(&self) -> bool;

    /// Adds a marker with a label popup.
    fn add_marker(&mut self, position: Position, label: &str) -> Result<MarkerId, MapError>;

    /// Removes a marker. Fails with [`MapError::MarkerDetached`] if it is
    /// already gone.
    fn remove_marker(&mut self, marker: MarkerId) -> Result<(), MapError>;

    /// Replaces the contents of the polygon source.
    fn set_polygon_source(&mut self, features: &[LocationFeature]) -> Result<(), MapError>;

    /// Animates the viewport to `bounds`.
    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions) -> Result<(), MapError>;

    /// Releases the underlying map. No other method is called afterwards.
    fn release(&mut self);
}

/// What a [`MapSynchronizer::reconcile`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The list equals the one already shown.
    Unchanged,
    /// The style is still loading; the list will be applied by
    /// [`MapSynchronizer::on_style_ready`].
    Deferred,
    /// The map now shows the list.
    Applied(RenderSummary),
}

/// The outcome of one applied pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    /// Markers added.
    pub markers: usize,
    /// Features placed in the polygon source.
    pub polygons: usize,
    /// The bounds the viewport was fitted to, if any coordinate was valid.
    pub bounds: Option<LngLatBounds>,
}

/// Keeps a [`MapSurface`] showing the latest feature list.
///
/// Dropping the synchronizer disposes of the map.
pub struct MapSynchronizer<S: MapSurface> {
    surface: Option<S>,
    markers: Vec<MarkerId>,
    applied: Vec<LocationFeature>,
    /// Set from the start of a pass until it completes. While set, the
    /// surface may show part of a list and the next list is always drawn.
    dirty: bool,
    pending: Option<Vec<LocationFeature>>,
    options: FitOptions,
}

impl<S: MapSurface + fmt::Debug> fmt::Debug for MapSynchronizer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSynchronizer")
            .field("surface", &self.surface)
            .field("markers", &self.markers)
            .field("applied", &self.applied.len())
            .field("dirty", &self.dirty)
            .field("pending", &self.pending.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl<S: MapSurface> MapSynchronizer<S> {
    /// Takes ownership of `surface`.
    pub fn new(surface: S) -> Self {
        Self::with_options(surface, FitOptions::default())
    }

    /// Takes ownership of `surface`, fitting the viewport with `options`.
    pub fn with_options(surface: S, options: FitOptions) -> Self {
        Self {
            surface: Some(surface),
            markers: Vec::new(),
            applied: Vec::new(),
            dirty: false,
            pending: None,
            options,
        }
    }

    /// The map, unless disposed.
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Mutable access to the map, unless disposed.
    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// The list currently shown.
    pub fn applied(&self) -> &[LocationFeature] {
        &self.applied
    }

    /// Whether the last pass failed part-way, leaving the map out of step
    /// with [`applied`](Self::applied).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a list is waiting for the style to load.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Brings the map in line with `features`.
    pub fn reconcile(&mut self, features: Vec<LocationFeature>) -> Result<Reconciliation, MapError> {
        let surface = self.surface.as_ref().ok_or(MapError::Released)?;
        if !self.dirty && features == self.applied {
            self.pending = None;
            return Ok(Reconciliation::Unchanged);
        }
        if !surface.is_style_loaded() {
            debug!(features = features.len(), "map style not loaded, deferring");
            self.pending = Some(features);
            return Ok(Reconciliation::Deferred);
        }
        self.apply(features).map(Reconciliation::Applied)
    }

    /// Applies the list deferred while the style was loading, if any.
    pub fn on_style_ready(&mut self) -> Result<Option<RenderSummary>, MapError> {
        match self.pending.take() {
            Some(features) => self.apply(features).map(Some),
            None => Ok(None),
        }
    }

    /// Removes every marker and releases the map. Later calls to
    /// [`reconcile`](Self::reconcile) fail with [`MapError::Released`].
    pub fn dispose(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        for marker in self.markers.drain(..) {
            if let Err(e) = surface.remove_marker(marker) {
                debug!(%marker, error = %e, "marker removal failed during dispose");
            }
        }
        surface.release();
        self.pending = None;
    }

    fn apply(&mut self, features: Vec<LocationFeature>) -> Result<RenderSummary, MapError> {
        let surface = self.surface.as_mut().ok_or(MapError::Released)?;
        self.dirty = true;

        let stale = std::mem::take(&mut self.markers);
        for (i, marker) in stale.iter().enumerate() {
            match surface.remove_marker(*marker) {
                Ok(()) | Err(MapError::MarkerDetached(_)) => {}
                Err(e) => {
                    self.markers.extend_from_slice(&stale[i..]);
                    return Err(e);
                }
            }
        }
        surface.set_polygon_source(&[])?;

        let mut bounds: Option<LngLatBounds> = None;
        let mut extend = |position: Position| match bounds.as_mut() {
            Some(b) => b.extend(position),
            None => bounds = Some(LngLatBounds::at(position)),
        };

        let mut polygons = Vec::new();
        for feature in &features {
            if feature.geometry.is_point() {
                let Some(position) = feature.geometry.point() else {
                    debug!(name = ?feature.name(), "skipping point with malformed coordinates");
                    continue;
                };
                let label = feature.name().unwrap_or(DEFAULT_LABEL);
                self.markers.push(surface.add_marker(position, label)?);
                extend(position);
            } else {
                feature.geometry.ring_vertices().into_iter().for_each(&mut extend);
                polygons.push(feature.clone());
            }
        }

        if !polygons.is_empty() {
            surface.set_polygon_source(&polygons)?;
        }
        if let Some(bounds) = bounds {
            surface.fit_bounds(bounds, self.options)?;
        }

        let summary = RenderSummary {
            markers: self.markers.len(),
            polygons: polygons.len(),
            bounds,
        };
        self.applied = features;
        self.dirty = false;
        Ok(summary)
    }
}

impl<S: MapSurface> Drop for MapSynchronizer<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
