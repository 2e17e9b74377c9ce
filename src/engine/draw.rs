//! Bounding-box draw interaction.
//!
//! ```text
//!            arm()                 pointer down             pointer up
//!   Idle ───────────▶ Armed ───────────────────▶ Drawing ───────────────▶ Idle
//!    ▲                  │ ▲                         │        (box emitted)
//!    └──── cancel() ────┘ └──── zero-area release ──┘
//! ```
//!
//! One armed interaction yields at most one committed box; drawing again
//! needs a fresh [`BoxDraw::arm`]. Re-arming from any state discards the
//! previous interaction and its scratch geometry without emitting anything.

use crate::engine::events::{SubscriptionKey, SubscriptionKind, Subscriptions};
use crate::engine::transforms::{HALF_WORLD, to_geographic};
use crate::error::MapViewResult;
use crate::model::{BoundingBox, Cursor, Extent, GeoPoint, RenderPoint};

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Armed,
    Drawing {
        anchor: RenderPoint,
        current: RenderPoint,
    },
}

#[derive(Debug, Default)]
pub struct BoxDraw {
    state: DrawState,
    scratch: Option<Extent>,
    interaction: Option<SubscriptionKey>,
}

impl BoxDraw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    /// True while armed or drawing.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, DrawState::Idle)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    pub fn scratch(&self) -> Option<Extent> {
        self.scratch
    }

    pub fn cursor(&self) -> Cursor {
        if self.is_active() {
            Cursor::Crosshair
        } else {
            Cursor::Default
        }
    }

    pub fn arm(&mut self, subscriptions: &mut Subscriptions) {
        self.detach(subscriptions);
        self.scratch = None;
        self.interaction = Some(subscriptions.subscribe(SubscriptionKind::DrawInteraction));
        self.state = DrawState::Armed;
        tracing::debug!("box draw armed");
    }

    /// Starts a drag at `at`. Returns false unless the interaction was armed.
    pub fn begin(&mut self, at: RenderPoint) -> bool {
        if self.state != DrawState::Armed {
            return false;
        }
        self.state = DrawState::Drawing {
            anchor: at,
            current: at,
        };
        self.scratch = Some(Extent::from_corners(at, at));
        true
    }

    /// Follows the pointer while drawing and returns the updated rectangle.
    pub fn update(&mut self, at: RenderPoint) -> Option<Extent> {
        let DrawState::Drawing { anchor, .. } = self.state else {
            return None;
        };
        self.state = DrawState::Drawing {
            anchor,
            current: at,
        };
        let rect = Extent::from_corners(anchor, at);
        self.scratch = Some(rect);
        Some(rect)
    }

    /// Finishes the drag at `at`.
    ///
    /// Returns the geographic box and detaches the interaction. The drawn
    /// rectangle is clipped to the projected world first, so the box never
    /// leaves [-180, 180] in longitude. A release on the press position, or
    /// a rectangle entirely off the world, draws nothing and keeps the
    /// interaction armed.
    pub fn commit(
        &mut self,
        at: RenderPoint,
        subscriptions: &mut Subscriptions,
    ) -> MapViewResult<Option<BoundingBox>> {
        let DrawState::Drawing { anchor, .. } = self.state else {
            return Ok(None);
        };
        let rect = clip_to_world(Extent::from_corners(anchor, at));
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            self.state = DrawState::Armed;
            self.scratch = None;
            return Ok(None);
        }
        self.scratch = Some(rect);
        self.detach(subscriptions);

        let lower_left = on_antimeridian(to_geographic(rect.lower_left())?);
        let upper_right = on_antimeridian(to_geographic(rect.upper_right())?);
        Ok(Some(BoundingBox::from_corners(lower_left, upper_right)))
    }

    /// Stops listening for gestures; optionally discards the scratch box.
    pub fn cancel(&mut self, subscriptions: &mut Subscriptions, clear_scratch: bool) {
        let was_active = self.is_active();
        self.detach(subscriptions);
        if clear_scratch {
            self.scratch = None;
        }
        if was_active {
            tracing::debug!("box draw cancelled");
        }
    }

    /// Drops the scratch box; the interaction state is unchanged.
    pub fn clear_scratch(&mut self) {
        self.scratch = None;
    }

    fn detach(&mut self, subscriptions: &mut Subscriptions) {
        if let Some(key) = self.interaction.take() {
            subscriptions.unsubscribe(key);
        }
        self.state = DrawState::Idle;
    }
}

// Non-finite rectangles pass through so the conversion reports them
fn clip_to_world(rect: Extent) -> Extent {
    if !rect.is_finite() {
        return rect;
    }
    Extent::new(
        rect.min_x.max(-HALF_WORLD),
        rect.min_y.max(-HALF_WORLD),
        rect.max_x.min(HALF_WORLD),
        rect.max_y.min(HALF_WORLD),
    )
}

// The world edge can convert to a longitude one ulp past 180
fn on_antimeridian(point: GeoPoint) -> GeoPoint {
    GeoPoint::new(point.lon.clamp(-180.0, 180.0), point.lat)
}
