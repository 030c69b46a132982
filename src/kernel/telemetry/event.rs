use serde::{Deserialize, Serialize};

use crate::kernel::catalog::{ArticleMeta, TrafficLight};
use crate::kernel::signal::ElementType;
use crate::kernel::time::Timestamp;

// Allowed: article ids, timestamps, durations, flags, catalog enrichment
// Forbidden: article text, pointer coordinates

/// Reporting context of a view interval or click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewContext {
    List,
    Modal,
    /// Forced close because the page became hidden.
    TabHidden,
    /// Forced close at session end.
    SessionEnd,
}

/// Where view time is committed. Forced-close contexts have no surface of
/// their own and inherit the one the interval was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    List,
    Modal,
}

impl ViewContext {
    pub fn surface(self) -> Option<Surface> {
        match self {
            ViewContext::List => Some(Surface::List),
            ViewContext::Modal => Some(Surface::Modal),
            ViewContext::TabHidden | ViewContext::SessionEnd => None,
        }
    }
}

impl From<Surface> for ViewContext {
    fn from(surface: Surface) -> Self {
        match surface {
            Surface::List => ViewContext::List,
            Surface::Modal => ViewContext::Modal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    ViewStart {
        article_id: String,
        context: ViewContext,
    },
    ViewEnd {
        article_id: String,
        context: ViewContext,
        duration_ms: u64,
    },
    HoverStart {
        article_id: String,
        is_traffic_light: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        traffic_light_status: Option<TrafficLight>,
        #[serde(skip_serializing_if = "Option::is_none")]
        misleading_score: Option<u8>,
    },
    HoverEnd {
        article_id: String,
        is_traffic_light: bool,
        hover_duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        traffic_light_status: Option<TrafficLight>,
        #[serde(skip_serializing_if = "Option::is_none")]
        misleading_score: Option<u8>,
    },
    Click {
        article_id: Option<String>,
        element_type: ElementType,
        context: ViewContext,
        #[serde(skip_serializing_if = "Option::is_none")]
        traffic_light_status: Option<TrafficLight>,
        #[serde(skip_serializing_if = "Option::is_none")]
        misleading_score: Option<u8>,
    },
    PageHidden,
    PageVisible,
}

impl EventKind {
    pub fn hover_start(article_id: &str, is_traffic_light: bool, meta: Option<ArticleMeta>) -> Self {
        EventKind::HoverStart {
            article_id: article_id.to_string(),
            is_traffic_light,
            traffic_light_status: meta.map(|m| m.traffic_light_status),
            misleading_score: meta.map(|m| m.misleading_score),
        }
    }

    pub fn hover_end(article_id: &str, is_traffic_light: bool, hover_duration_ms: u64, meta: Option<ArticleMeta>) -> Self {
        EventKind::HoverEnd {
            article_id: article_id.to_string(),
            is_traffic_light,
            hover_duration_ms,
            traffic_light_status: meta.map(|m| m.traffic_light_status),
            misleading_score: meta.map(|m| m.misleading_score),
        }
    }

    pub fn click(article_id: Option<String>, element_type: ElementType, context: ViewContext, meta: Option<ArticleMeta>) -> Self {
        EventKind::Click {
            article_id,
            element_type,
            context,
            traffic_light_status: meta.map(|m| m.traffic_light_status),
            misleading_score: meta.map(|m| m.misleading_score),
        }
    }

    /// Wire name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::SessionEnd => "session_end",
            EventKind::ViewStart { .. } => "view_start",
            EventKind::ViewEnd { .. } => "view_end",
            EventKind::HoverStart { .. } => "hover_start",
            EventKind::HoverEnd { .. } => "hover_end",
            EventKind::Click { .. } => "click",
            EventKind::PageHidden => "page_hidden",
            EventKind::PageVisible => "page_visible",
        }
    }

    /// Critical events bypass batching: clicks and traffic-light hovers.
    pub fn is_critical(&self) -> bool {
        match self {
            EventKind::Click { .. } => true,
            EventKind::HoverStart { is_traffic_light, .. } | EventKind::HoverEnd { is_traffic_light, .. } => *is_traffic_light,
            _ => false,
        }
    }

    pub fn article_id(&self) -> Option<&str> {
        match self {
            EventKind::ViewStart { article_id, .. }
            | EventKind::ViewEnd { article_id, .. }
            | EventKind::HoverStart { article_id, .. }
            | EventKind::HoverEnd { article_id, .. } => Some(article_id),
            EventKind::Click { article_id, .. } => article_id.as_deref(),
            _ => None,
        }
    }
}

/// Immutable interaction record as stored in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub ts: Timestamp,
    pub pid: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TelemetryEvent {
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }
}

/// Event as shipped to the collector: the logged record plus session metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(flatten)]
    pub event: TelemetryEvent,
    pub timestamp: Timestamp,
    pub participant_id: Option<String>,
    pub session_start: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn event(kind: EventKind) -> TelemetryEvent {
        TelemetryEvent { ts: DateTime::<Utc>::UNIX_EPOCH, pid: Some("p1".into()), kind }
    }

    #[test]
    fn test_critical_classification() {
        let click = EventKind::click(Some("5".into()), ElementType::ArticleCard, ViewContext::Modal, None);
        assert!(click.is_critical());
        assert!(EventKind::hover_start("3", true, None).is_critical());
        assert!(EventKind::hover_end("3", true, 10, None).is_critical());
        assert!(!EventKind::hover_start("3", false, None).is_critical());
        assert!(!EventKind::hover_end("3", false, 10, None).is_critical());
        assert!(!EventKind::PageHidden.is_critical());
        assert!(!EventKind::ViewStart { article_id: "1".into(), context: ViewContext::List }.is_critical());
    }

    #[test]
    fn test_view_end_wire_fields() {
        let value = serde_json::to_value(event(EventKind::ViewEnd {
            article_id: "2".into(),
            context: ViewContext::TabHidden,
            duration_ms: 750,
        }))
        .unwrap();

        assert_eq!(value["type"], "view_end");
        assert_eq!(value["articleId"], "2");
        assert_eq!(value["context"], "tab_hidden");
        assert_eq!(value["durationMs"], 750);
        assert_eq!(value["pid"], "p1");
        assert!(value["ts"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_enrichment_omitted_when_unknown() {
        let value = serde_json::to_value(event(EventKind::hover_start("42", false, None))).unwrap();
        assert!(value.get("trafficLightStatus").is_none());
        assert_eq!(value["isTrafficLight"], json!(false));
    }

    #[test]
    fn test_wire_event_carries_metadata() {
        let wire = WireEvent {
            event: event(EventKind::PageHidden),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            participant_id: None,
            session_start: Some(DateTime::<Utc>::UNIX_EPOCH),
        };
        let value = serde_json::to_value(wire).unwrap();
        assert_eq!(value["type"], "page_hidden");
        assert_eq!(value["participantId"], json!(null));
        assert!(value["sessionStart"].is_string());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_logged_event_reads_back() {
        let original = event(EventKind::hover_end("3", true, 500, None));
        let json = serde_json::to_string(&original).unwrap();
        let parsed: TelemetryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
