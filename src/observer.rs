//! Viewport intersection observation.
//!
//! The observer tracks a set of target elements and, whenever the host tells
//! it the layout may have changed, reports every target whose intersection
//! state flipped since the previous check. All changes found in one check are
//! delivered together as a single [`VisibilityBatch`].

use std::collections::HashMap;

use crate::dom::NodeId;
use crate::events::{SubscriptionId, Subscribers};

/// Vertical extent of an element relative to the viewport's top edge.
///
/// A negative `top` means the element starts above the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingRect {
    pub top: f64,
    pub height: f64,
}

/// Live layout queries, answered by the host.
pub trait Geometry {
    fn bounding_rect(&self, element: NodeId) -> BoundingRect;
    fn viewport_height(&self) -> f64;
}

/// One target's visibility change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeId,
    /// Whether the visible fraction reached the observer's threshold.
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// Changes delivered together, with access to live layout.
pub struct VisibilityBatch<'a> {
    pub entries: &'a [IntersectionEntry],
    pub geometry: &'a dyn Geometry,
}

/// Handler signature for [`IntersectionObserver::on_visibility_batch_changed`].
pub type BatchHandler = dyn for<'a> FnMut(&VisibilityBatch<'a>);

/// Fraction of `rect` inside a viewport spanning `[0, viewport_height]`.
///
/// Zero-height elements count as fully visible while their top edge lies
/// within the viewport.
pub fn intersection_ratio(rect: BoundingRect, viewport_height: f64) -> f64 {
    if rect.height <= 0.0 {
        return if rect.top >= 0.0 && rect.top <= viewport_height {
            1.0
        } else {
            0.0
        };
    }
    let visible_top = rect.top.max(0.0);
    let visible_bottom = (rect.top + rect.height).min(viewport_height);
    ((visible_bottom - visible_top).max(0.0) / rect.height).min(1.0)
}

/// Observes targets against a single threshold.
pub struct IntersectionObserver {
    threshold: f64,
    targets: Vec<NodeId>,
    /// Last reported state per target; absent until first check.
    last_state: HashMap<NodeId, bool>,
    handlers: Subscribers<BatchHandler>,
}

impl IntersectionObserver {
    /// `threshold` is clamped to `[0, 1]`; `1.0` means fully visible.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            targets: Vec::new(),
            last_state: HashMap::new(),
            handlers: Subscribers::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Start observing `target`. Its state is reported on the next check.
    pub fn observe(&mut self, target: NodeId) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn unobserve(&mut self, target: NodeId) {
        self.targets.retain(|&t| t != target);
        self.last_state.remove(&target);
    }

    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    pub fn on_visibility_batch_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: for<'a> FnMut(&VisibilityBatch<'a>) + 'static,
    {
        self.handlers.subscribe(Box::new(handler))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.unsubscribe(id)
    }

    /// Re-evaluate every target against `geometry` and deliver the changes.
    ///
    /// Targets seen for the first time are always reported. Returns the
    /// number of entries delivered; nothing is delivered when it is zero.
    pub fn check(&mut self, geometry: &dyn Geometry) -> usize {
        let viewport_height = geometry.viewport_height();
        let mut entries = Vec::new();
        for &target in &self.targets {
            let ratio = intersection_ratio(geometry.bounding_rect(target), viewport_height);
            let is_intersecting = ratio > 0.0 && ratio >= self.threshold;
            if self.last_state.get(&target) != Some(&is_intersecting) {
                self.last_state.insert(target, is_intersecting);
                entries.push(IntersectionEntry {
                    target,
                    is_intersecting,
                    intersection_ratio: ratio,
                });
            }
        }
        if !entries.is_empty() {
            self.deliver(&entries, geometry);
        }
        entries.len()
    }

    /// Deliver a batch to every subscriber as-is.
    ///
    /// Used by [`check`](Self::check); hosts and tests may also inject
    /// synthetic batches directly.
    pub fn deliver(&mut self, entries: &[IntersectionEntry], geometry: &dyn Geometry) {
        log::debug!("[observe] batch entries={}", entries.len());
        let batch = VisibilityBatch { entries, geometry };
        for handler in self.handlers.handlers_mut() {
            handler(&batch);
        }
    }
}
