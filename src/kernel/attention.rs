use std::collections::HashMap;
use tracing::debug;

use super::signal::ElementRef;
use super::telemetry::event::{EventKind, Surface, ViewContext};
use super::telemetry::metrics::{AttentionLedger, HoverKind};
use super::time::{elapsed_ms, Timestamp};

/// Default share of an article container that must be on screen to count as visible.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenView {
    pub start: Timestamp,
    pub surface: Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenHover {
    pub start: Timestamp,
    pub kind: HoverKind,
}

/// A hover interval opened or closed. `duration_ms` is set on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverTransition {
    pub article_id: String,
    pub is_traffic_light: bool,
    pub duration_ms: Option<u64>,
}

/// Tracks open visibility/hover intervals and folds closed ones into the ledger.
///
/// An article id is a key in `visible` (resp. `hovered`) iff an interval is
/// open for it. Closing removes the key before committing, so an interval is
/// committed at most once no matter how many close paths race for it.
#[derive(Debug)]
pub struct AttentionTracker {
    visible: HashMap<String, OpenView>,
    hovered: HashMap<String, OpenHover>,
    ledger: AttentionLedger,
    modal_article: Option<String>,
    page_visible: bool,
    threshold: f64,
}

impl AttentionTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            visible: HashMap::new(),
            hovered: HashMap::new(),
            ledger: AttentionLedger::new(),
            modal_article: None,
            page_visible: true,
            threshold,
        }
    }

    /// Opens a visibility interval. No-op while one is already open or the page is hidden.
    pub fn start_visibility(&mut self, article_id: &str, surface: Surface, now: Timestamp) -> Option<EventKind> {
        if article_id.is_empty() || !self.page_visible {
            return None;
        }
        if self.visible.contains_key(article_id) {
            debug!(article_id, "visibility already open");
            return None;
        }

        self.visible.insert(article_id.to_string(), OpenView { start: now, surface });
        self.ledger.record_view_start(article_id);

        Some(EventKind::ViewStart {
            article_id: article_id.to_string(),
            context: surface.into(),
        })
    }

    /// Closes the open interval for `article_id` and commits its duration.
    ///
    /// `List`/`Modal` only close an interval opened on that same surface.
    /// Forced contexts (`TabHidden`, `SessionEnd`) close whatever is open.
    pub fn end_visibility(&mut self, article_id: &str, context: ViewContext, now: Timestamp) -> Option<EventKind> {
        let open = *self.visible.get(article_id)?;
        let surface = match context.surface() {
            Some(requested) if requested != open.surface => {
                debug!(article_id, ?requested, open = ?open.surface, "close ignored: surface mismatch");
                return None;
            }
            Some(requested) => requested,
            None => open.surface,
        };

        self.visible.remove(article_id);
        let duration_ms = elapsed_ms(open.start, now);
        self.ledger.commit_view(article_id, surface, duration_ms);

        Some(EventKind::ViewEnd {
            article_id: article_id.to_string(),
            context,
            duration_ms,
        })
    }

    /// Viewport observer callback.
    pub fn on_intersection(&mut self, article_id: &str, ratio: f64, is_intersecting: bool, now: Timestamp) -> Option<EventKind> {
        if is_intersecting && ratio >= self.threshold {
            self.start_visibility(article_id, Surface::List, now)
        } else {
            self.end_visibility(article_id, ViewContext::List, now)
        }
    }

    /// Enters focused reading for `article_id`.
    ///
    /// 1. Any other modal article is closed.
    /// 2. A list interval for the same article is closed (list and modal are exclusive).
    /// 3. The article is opened in `Modal`.
    pub fn open_modal(&mut self, article_id: &str, now: Timestamp) -> Vec<EventKind> {
        let mut events = Vec::new();

        if let Some(previous) = self.modal_article.take() {
            if previous != article_id {
                events.extend(self.end_visibility(&previous, ViewContext::Modal, now));
            }
        }
        events.extend(self.end_visibility(article_id, ViewContext::List, now));

        self.modal_article = Some(article_id.to_string());
        events.extend(self.start_visibility(article_id, Surface::Modal, now));
        events
    }

    pub fn close_modal(&mut self, now: Timestamp) -> Option<EventKind> {
        let article_id = self.modal_article.take()?;
        self.end_visibility(&article_id, ViewContext::Modal, now)
    }

    /// Force-closes every open visibility interval, in article id order.
    pub fn pause_all(&mut self, context: ViewContext, now: Timestamp) -> Vec<EventKind> {
        let mut ids: Vec<String> = self.visible.keys().cloned().collect();
        ids.sort();
        ids.iter()
            .filter_map(|id| self.end_visibility(id, context, now))
            .collect()
    }

    pub fn set_page_visible(&mut self, visible: bool) {
        self.page_visible = visible;
    }

    pub fn page_visible(&self) -> bool {
        self.page_visible
    }

    /// Pointer entered an element. Opens a hover keyed by article id, tagged
    /// by whether the entered element sits inside a traffic-light indicator.
    pub fn hover_enter(&mut self, target: &ElementRef, now: Timestamp) -> Option<HoverTransition> {
        let article_id = target.article_id.as_deref().filter(|id| !id.is_empty())?;
        if self.hovered.contains_key(article_id) {
            return None;
        }

        let is_traffic_light = target.within_traffic_light();
        self.hovered.insert(
            article_id.to_string(),
            OpenHover {
                start: now,
                kind: HoverKind::from_flag(is_traffic_light),
            },
        );

        Some(HoverTransition {
            article_id: article_id.to_string(),
            is_traffic_light,
            duration_ms: None,
        })
    }

    /// Pointer left an element. Only leaving the article container closes the hover.
    pub fn hover_leave(&mut self, target: &ElementRef, now: Timestamp) -> Option<HoverTransition> {
        if !target.is_article_root {
            return None;
        }
        let article_id = target.article_id.as_deref()?;
        self.close_hover(article_id, now)
    }

    fn close_hover(&mut self, article_id: &str, now: Timestamp) -> Option<HoverTransition> {
        let open = self.hovered.remove(article_id)?;
        let duration_ms = elapsed_ms(open.start, now);
        self.ledger.commit_hover(article_id, open.kind, duration_ms);

        Some(HoverTransition {
            article_id: article_id.to_string(),
            is_traffic_light: open.kind == HoverKind::TrafficLight,
            duration_ms: Some(duration_ms),
        })
    }

    /// Force-closes every open hover, committing durations. Emits no events.
    pub fn close_all_hovers(&mut self, now: Timestamp) -> usize {
        let mut ids: Vec<String> = self.hovered.keys().cloned().collect();
        ids.sort();
        ids.iter().filter(|id| self.close_hover(id, now).is_some()).count()
    }

    pub fn is_visible(&self, article_id: &str) -> bool {
        self.visible.contains_key(article_id)
    }

    pub fn is_hovered(&self, article_id: &str) -> bool {
        self.hovered.contains_key(article_id)
    }

    pub fn open_view(&self, article_id: &str) -> Option<&OpenView> {
        self.visible.get(article_id)
    }

    pub fn open_visibility_count(&self) -> usize {
        self.visible.len()
    }

    pub fn open_hover_count(&self) -> usize {
        self.hovered.len()
    }

    pub fn modal_article(&self) -> Option<&str> {
        self.modal_article.as_deref()
    }

    pub fn ledger(&self) -> &AttentionLedger {
        &self.ledger
    }
}

impl Default for AttentionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn at(ms: i64) -> Timestamp {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn test_threshold_boundary() {
        let mut tracker = AttentionTracker::default();
        assert!(tracker.on_intersection("1", 0.49, true, at(0)).is_none());
        assert!(tracker.on_intersection("1", 0.5, true, at(0)).is_some());
        assert!(tracker.is_visible("1"));
        assert!(tracker.on_intersection("1", 0.3, true, at(400)).is_some());
        assert!(!tracker.is_visible("1"));
    }

    #[test]
    fn test_list_close_does_not_end_modal() {
        let mut tracker = AttentionTracker::default();
        tracker.open_modal("1", at(0));
        // Card scrolls out behind the modal
        assert!(tracker.on_intersection("1", 0.0, false, at(100)).is_none());
        assert!(tracker.is_visible("1"));
    }

    #[test]
    fn test_open_modal_moves_list_interval() {
        let mut tracker = AttentionTracker::default();
        tracker.on_intersection("2", 1.0, true, at(0));
        let events = tracker.open_modal("2", at(300));
        assert_eq!(events.len(), 2);
        assert_eq!(tracker.open_view("2").unwrap().surface, Surface::Modal);

        tracker.close_modal(at(1300));
        let rec = tracker.ledger().article("2").unwrap();
        assert_eq!((rec.list_view_ms, rec.modal_view_ms, rec.view_count), (300, 1000, 2));
    }

    #[test]
    fn test_nested_leave_keeps_hover_open() {
        let mut tracker = AttentionTracker::default();
        let inner = ElementRef {
            article_id: Some("4".into()),
            tag: "SPAN".into(),
            ..Default::default()
        };
        let root = ElementRef { is_article_root: true, ..inner.clone() };

        assert!(tracker.hover_enter(&inner, at(0)).is_some());
        assert!(tracker.hover_leave(&inner, at(50)).is_none());
        assert!(tracker.is_hovered("4"));
        let closed = tracker.hover_leave(&root, at(80)).unwrap();
        assert_eq!(closed.duration_ms, Some(80));
    }

    #[test]
    fn test_hidden_page_blocks_new_intervals() {
        let mut tracker = AttentionTracker::default();
        tracker.set_page_visible(false);
        assert!(tracker.start_visibility("1", Surface::List, at(0)).is_none());
        tracker.set_page_visible(true);
        assert!(tracker.start_visibility("1", Surface::List, at(0)).is_some());
    }
}
