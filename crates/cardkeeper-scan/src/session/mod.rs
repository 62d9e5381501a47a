// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive crop session.
//
// One session per captured image. Detection runs once in the background and
// seeds the handles; the user then drags corners and edges, optionally turns
// the image, and commits the crop. The session owner is the only context that
// touches handle state: background results travel over a oneshot channel and
// are applied by `poll_detection` / `wait_for_detection`.

pub mod handles;

use std::sync::{Arc, Weak};

use image::DynamicImage;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use cardkeeper_core::error::{CardkeeperError, Result};
use cardkeeper_core::{CropConfig, Point, Rect, SessionId};

use crate::detect::RectangleDetector;
use crate::feature::RectangleFeature;
use crate::image::SourceImage;
use crate::perspective::{self, CorrectionInput};

pub use handles::{CropHandles, DragTarget};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, detection not started.
    Uninitialized,
    /// Detection in flight; no handles yet.
    Detecting,
    /// Handles placed and idle.
    Ready,
    /// One handle is being dragged.
    Dragging(DragTarget),
    /// A crop has been produced.
    Committed,
    /// Handles removed; nothing to draw or commit.
    Hidden,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Detecting => "detecting",
            SessionState::Ready => "ready",
            SessionState::Dragging(_) => "dragging",
            SessionState::Committed => "committed",
            SessionState::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a drag step. Rejected moves leave every handle where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    Moved,
    Rejected,
}

impl DragOutcome {
    pub fn is_moved(&self) -> bool {
        *self == DragOutcome::Moved
    }
}

/// Magnified view shown next to the finger while a corner is dragged.
#[derive(Debug, Clone)]
pub struct Loupe {
    pub image: DynamicImage,
    /// Display position of the loupe's centre.
    pub center: Point,
}

/// Interactive crop over one source image.
pub struct CropSession {
    id: SessionId,
    config: CropConfig,
    image: Arc<SourceImage>,
    display_bounds: Rect,
    image_rect: Rect,
    state: SessionState,
    feature: Option<RectangleFeature>,
    handles: Option<CropHandles>,
    loupe: Option<Loupe>,
    pending: Option<oneshot::Receiver<RectangleFeature>>,
    /// Background detection holds a `Weak` to this and delivers only while it
    /// can still be upgraded.
    alive: Arc<()>,
}

impl CropSession {
    pub fn new(image: SourceImage, display_bounds: Rect, config: CropConfig) -> Self {
        let image_rect = Rect::aspect_fit(image.size(), display_bounds);
        let id = SessionId::new();
        debug!(session = %id, ?image_rect, "Crop session created");
        Self {
            id,
            config,
            image: Arc::new(image),
            display_bounds,
            image_rect,
            state: SessionState::Uninitialized,
            feature: None,
            handles: None,
            loupe: None,
            pending: None,
            alive: Arc::new(()),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn image(&self) -> &SourceImage {
        &self.image
    }

    pub fn display_bounds(&self) -> Rect {
        self.display_bounds
    }

    /// The on-screen rect the image occupies inside the display bounds.
    pub fn image_rect(&self) -> Rect {
        self.image_rect
    }

    /// The detection result the handles were seeded from.
    pub fn feature(&self) -> Option<&RectangleFeature> {
        self.feature.as_ref()
    }

    pub fn handles(&self) -> Option<&CropHandles> {
        self.handles.as_ref()
    }

    pub fn loupe(&self) -> Option<&Loupe> {
        self.loupe.as_ref()
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(session = %self.id, from = %self.state, to = %next, "Crop session state change");
            self.state = next;
        }
    }

    fn not_ready(&self) -> CardkeeperError {
        CardkeeperError::SessionNotReady {
            state: self.state.to_string(),
        }
    }

    // -- Detection ------------------------------------------------------------

    /// Start the session.
    ///
    /// With `expanded` the handles are seeded from the full image bounds right
    /// away. Otherwise `detector` runs on the blocking pool of the current
    /// Tokio runtime and the session stays in `Detecting` until the result is
    /// applied. Without a runtime detection runs inline.
    #[instrument(skip(self, detector), fields(session = %self.id))]
    pub fn begin(&mut self, expanded: bool, detector: Arc<dyn RectangleDetector>) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(self.not_ready());
        }
        let inset = self.config.fallback_inset;

        if expanded {
            self.seed(RectangleFeature::fallback(self.image.size(), inset));
            return Ok(());
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (tx, rx) = oneshot::channel();
                let alive = Arc::downgrade(&self.alive);
                let image = Arc::clone(&self.image);
                let session = self.id;
                runtime.spawn_blocking(move || {
                    let feature = RectangleFeature::detect(&image, false, detector.as_ref(), inset);
                    if !deliver(&alive, tx, feature) {
                        debug!(%session, "Session gone before detection finished");
                    }
                });
                self.pending = Some(rx);
                self.transition(SessionState::Detecting);
            }
            Err(_) => {
                debug!("No async runtime; detecting inline");
                let feature = RectangleFeature::detect(&self.image, false, detector.as_ref(), inset);
                self.seed(feature);
            }
        }
        Ok(())
    }

    /// Apply a finished background detection, if there is one.
    ///
    /// Returns `true` when handles were seeded by this call. A detection task
    /// that died without answering counts as "nothing found".
    pub fn poll_detection(&mut self) -> bool {
        let Some(rx) = self.pending.as_mut() else {
            return false;
        };
        let feature = match rx.try_recv() {
            Ok(feature) => feature,
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => {
                warn!(session = %self.id, "Detection task ended without a result");
                RectangleFeature::fallback(self.image.size(), self.config.fallback_inset)
            }
        };
        self.pending = None;
        self.seed(feature);
        true
    }

    /// Wait for the background detection and apply it.
    pub async fn wait_for_detection(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => return Err(self.not_ready()),
            SessionState::Detecting => {}
            _ => return Ok(()),
        }
        let Some(rx) = self.pending.take() else {
            return Err(self.not_ready());
        };
        let feature = match rx.await {
            Ok(feature) => feature,
            Err(_) => {
                warn!(session = %self.id, "Detection task ended without a result");
                RectangleFeature::fallback(self.image.size(), self.config.fallback_inset)
            }
        };
        self.seed(feature);
        Ok(())
    }

    /// Place the handles for `feature` in the current image rect.
    fn seed(&mut self, feature: RectangleFeature) {
        let rect = self.image_rect;
        let display_quad = feature
            .convert_to(rect.size, self.image.orientation())
            .quad()
            .offset_by(rect.min_x(), rect.min_y());
        debug!(session = %self.id, detected = feature.is_correct(), quad = %display_quad, "Handles seeded");
        self.feature = Some(feature);
        self.handles = Some(CropHandles::new(display_quad));
        self.loupe = None;
        self.transition(SessionState::Ready);
    }

    // -- Layout ---------------------------------------------------------------

    /// The hosting view changed size. Handles follow the image onto its new
    /// on-screen rect.
    pub fn set_display_bounds(&mut self, bounds: Rect) {
        let previous = self.image_rect;
        self.display_bounds = bounds;
        self.image_rect = Rect::aspect_fit(self.image.size(), bounds);

        if let Some(handles) = self.handles {
            if previous.width() > 0.0 {
                self.handles = Some(handles.reprojected(&previous, &self.image_rect));
            } else if let Some(feature) = self.feature {
                let rect = self.image_rect;
                let display = feature
                    .convert_to(rect.size, self.image.orientation())
                    .quad()
                    .offset_by(rect.min_x(), rect.min_y());
                self.handles = Some(CropHandles::new(display));
            }
        }
        debug!(session = %self.id, image_rect = ?self.image_rect, "Display bounds updated");
    }

    // -- Dragging -------------------------------------------------------------

    /// Grab a handle. Needs placed handles.
    pub fn begin_drag(&mut self, target: DragTarget) -> Result<()> {
        match self.state {
            SessionState::Ready | SessionState::Dragging(_) | SessionState::Committed
                if self.handles.is_some() =>
            {
                self.transition(SessionState::Dragging(target));
                Ok(())
            }
            _ => Err(self.not_ready()),
        }
    }

    /// Move the grabbed handle towards `point`.
    pub fn drag_to(&mut self, point: Point) -> DragOutcome {
        match self.state {
            SessionState::Dragging(target) if target.is_corner() => self.drag_corner(target, point),
            SessionState::Dragging(target) => self.drag_edge(target, point),
            _ => DragOutcome::Rejected,
        }
    }

    /// Let go of the grabbed handle.
    pub fn end_drag(&mut self) {
        self.loupe = None;
        if let SessionState::Dragging(_) = self.state {
            self.transition(SessionState::Ready);
        }
    }

    /// Move one corner to `point` (display coordinates).
    ///
    /// Accepted moves refresh the loupe; a loupe that cannot be produced is
    /// simply not shown.
    pub fn drag_corner(&mut self, corner: DragTarget, point: Point) -> DragOutcome {
        let rect = self.image_rect;
        let Some(handles) = self.handles.as_mut() else {
            return DragOutcome::Rejected;
        };
        if !handles.try_move_corner(corner, point, &rect) {
            return DragOutcome::Rejected;
        }
        self.loupe = self.loupe_at(point);
        DragOutcome::Moved
    }

    /// Slide one edge so its midpoint follows `point` (display coordinates).
    pub fn drag_edge(&mut self, edge: DragTarget, point: Point) -> DragOutcome {
        let rect = self.image_rect;
        let Some(handles) = self.handles.as_mut() else {
            return DragOutcome::Rejected;
        };
        if handles.try_move_edge(edge, point, &rect) {
            DragOutcome::Moved
        } else {
            DragOutcome::Rejected
        }
    }

    fn loupe_at(&self, point: Point) -> Option<Loupe> {
        let rect = self.image_rect;
        if !(rect.width() > 0.0) {
            return None;
        }
        let cfg = &self.config;
        let scale = if self.image.size().width / rect.width() < cfg.loupe_close_ratio {
            cfg.loupe_close_scale
        } else {
            cfg.loupe_scale
        };
        let local = Point::new(point.x - rect.min_x(), point.y - rect.min_y());
        let image = self.image.loupe(local, scale, rect.size)?;
        Some(Loupe {
            image,
            center: Point::new(point.x, point.y - cfg.loupe_offset),
        })
    }

    // -- Handle resets --------------------------------------------------------

    /// Reset the handles to the full image bounds. Drops any pending
    /// detection.
    pub fn expand(&mut self) {
        self.pending = None;
        let feature = RectangleFeature::fallback(self.image.size(), self.config.fallback_inset);
        self.seed(feature);
    }

    /// Remove the handles. Nothing is drawn and nothing can be committed
    /// until [`expand`](Self::expand).
    pub fn hide(&mut self) {
        self.pending = None;
        self.feature = None;
        self.handles = None;
        self.loupe = None;
        self.transition(SessionState::Hidden);
    }

    /// Turn the image a quarter turn clockwise and carry the handles with it.
    ///
    /// The new image is upright. Not available while detection is pending.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn rotate_clockwise(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Uninitialized | SessionState::Detecting) {
            return Err(self.not_ready());
        }
        let prev_rect = self.image_rect;
        let prev_size = self.image.size();

        let rotated = self.image.rotated_clockwise();
        let new_size = rotated.size();
        let new_rect = Rect::aspect_fit(new_size, self.display_bounds);
        self.image = Arc::new(rotated);
        self.image_rect = new_rect;

        if let Some(handles) = self.handles {
            self.handles = Some(handles.rotated_clockwise(&prev_rect, prev_size, &new_rect, new_size));
        }
        // The stored feature belongs to the old pixels; relayout now works
        // from the handles alone.
        self.feature = None;
        self.loupe = None;
        if let SessionState::Dragging(_) = self.state {
            self.transition(SessionState::Ready);
        }
        info!(width = new_size.width, height = new_size.height, "Image rotated clockwise");
        Ok(())
    }

    // -- Output ---------------------------------------------------------------

    /// Closed handle path in display coordinates, for drawing the overlay.
    pub fn crop_path(&self) -> Option<[Point; 5]> {
        self.handles.map(|h| h.quad().path())
    }

    /// Closed handle path in upright image pixels.
    pub fn crop_path_in_image(&self) -> Option<[Point; 5]> {
        let handles = self.handles?;
        handles
            .to_image_space(&self.image_rect, self.image.size())
            .map(|q| q.path())
    }

    /// Produce the perspective-corrected crop.
    ///
    /// On [`CardkeeperError::CropFailed`] the session keeps its handles and
    /// state so the commit can be retried.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn crop(&mut self) -> Result<SourceImage> {
        let Some(handles) = self.handles else {
            return Err(self.not_ready());
        };
        let Some(quad) = handles.to_image_space(&self.image_rect, self.image.size()) else {
            return Err(CardkeeperError::CropFailed("display rect is empty".into()));
        };

        let input = CorrectionInput::from_image_quad(
            &quad,
            self.image.orientation(),
            self.image.pixel_size().height,
        );
        match perspective::correct(&self.image, input, self.config.output_extent) {
            Ok(cropped) => {
                self.loupe = None;
                self.transition(SessionState::Committed);
                let size = cropped.pixel_size();
                info!(width = size.width, height = size.height, "Crop committed");
                Ok(cropped)
            }
            Err(err) => {
                warn!(error = %err, "Crop failed; handles kept for retry");
                Err(err)
            }
        }
    }
}

/// Hand a detection result to its session if the session still exists.
fn deliver(alive: &Weak<()>, tx: oneshot::Sender<RectangleFeature>, feature: RectangleFeature) -> bool {
    if alive.upgrade().is_none() {
        return false;
    }
    tx.send(feature).is_ok()
}
