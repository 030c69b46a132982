use std::sync::Arc;

use feedwatch::kernel::catalog::{ArticleCatalog, TrafficLight};
use feedwatch::kernel::session::{SessionPhase, HOST_MESSAGE_TYPE, SUMMARY_RECORD_TYPE};
use feedwatch::kernel::signal::{ElementRef, Signal};
use feedwatch::kernel::telemetry::event::{EventKind, ViewContext};
use feedwatch::kernel::time::ManualClock;
use feedwatch::{SideEffect, Tracker, TrackerConfig};

fn collector_config() -> TrackerConfig {
    TrackerConfig {
        collector_url: Some("http://collector.invalid/exec".into()),
        ..TrackerConfig::default()
    }
}

fn tracker(config: TrackerConfig, launch: Option<&str>) -> (Tracker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch());
    let mut tracker = Tracker::new(config, Arc::new(ArticleCatalog::builtin()), clock.clone());
    tracker.init(launch);
    (tracker, clock)
}

fn card(id: &str) -> ElementRef {
    ElementRef {
        article_id: Some(id.into()),
        tag: "DIV".into(),
        classes: vec!["article-card".into()],
        ancestor_classes: vec![],
        is_article_root: true,
    }
}

#[tokio::test]
async fn test_participant_from_launch_url() {
    let (tracker, _) = tracker(TrackerConfig::default(), Some("https://study.example/index.html?pid=abc123"));
    assert_eq!(tracker.participant_id(), Some("abc123"));
    assert_eq!(tracker.log().events()[0].pid.as_deref(), Some("abc123"));

    let (anonymous, _) = crate::tracker(TrackerConfig::default(), Some("?cond=a"));
    assert_eq!(anonymous.participant_id(), None);
    assert_eq!(anonymous.log().events()[0].kind, EventKind::SessionStart);
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let (mut tracker, clock) = tracker(collector_config(), Some("pid=p1"));
    clock.advance_ms(3000);

    let first = tracker.dispose();
    assert!(!first.is_empty());
    assert_eq!(tracker.session().phase(), SessionPhase::Ended);
    assert_eq!(tracker.session().duration_ms(), Some(3000));

    let second = tracker.end_session();
    assert!(second.is_empty(), "second end must do nothing");
    assert_eq!(tracker.log().count_of("session_end"), 1);
}

#[tokio::test]
async fn test_report_built_before_session_end_event() {
    let (mut tracker, clock) = tracker(TrackerConfig::default(), Some("pid=p2"));
    tracker.handle(Signal::Intersection {
        article_id: "4".into(),
        ratio: 1.0,
        is_intersecting: true,
    });
    clock.advance_ms(900);
    tracker.dispose();

    let report = tracker.report().expect("report exists after end");
    assert_eq!(report.events.len() + 1, tracker.log().len());
    assert!(report.events.iter().all(|e| e.kind != EventKind::SessionEnd));
    assert_eq!(tracker.log().last().unwrap().kind, EventKind::SessionEnd);

    // Open view closed with the session_end context
    assert!(report.events.iter().any(|e| e.kind
        == EventKind::ViewEnd {
            article_id: "4".into(),
            context: ViewContext::SessionEnd,
            duration_ms: 900,
        }));

    let times = &report.article_times[0];
    assert_eq!(times.record.article_id, "4");
    assert_eq!(times.record.total_ms, 900);
    assert_eq!(times.traffic_light_status, Some(TrafficLight::Yellow));
    assert_eq!(times.misleading_score, Some(52));
}

#[tokio::test]
async fn test_open_hovers_committed_without_events() {
    let (mut tracker, clock) = tracker(TrackerConfig::default(), None);
    tracker.handle(Signal::PointerEnter { target: card("8") });
    clock.advance_ms(650);
    tracker.dispose();

    assert_eq!(tracker.log().count_of("hover_end"), 0);
    let report = tracker.report().unwrap();
    assert_eq!(report.article_hovers.len(), 1);
    assert_eq!(report.article_hovers[0].hover_duration_ms, 650);
    assert_eq!(tracker.attention().open_hover_count(), 0);
}

#[tokio::test]
async fn test_terminal_dispatch_to_host_and_collector() {
    let (mut tracker, clock) = tracker(collector_config(), Some("pid=p3"));
    tracker.handle(Signal::ModalOpened { article_id: "9".into() });
    clock.advance_ms(1200);

    let effects = tracker.dispose();

    let host: Vec<_> = effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::PostToHost(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(host.len(), 1);
    assert_eq!(host[0].message_type, HOST_MESSAGE_TYPE);
    assert_eq!(host[0].payload.participant_id.as_deref(), Some("p3"));

    // Batch flush, then full log, then the summary row
    let sent: Vec<_> = effects.iter().filter_map(|e| e.as_delivery()).collect();
    assert_eq!(sent.len(), 3);

    let full_log = serde_json::to_value(&sent[1].payload).unwrap();
    let rows = full_log["events"].as_array().unwrap();
    assert_eq!(rows.len(), tracker.log().len());
    assert_eq!(rows.last().unwrap()["type"], "session_end");

    let summary = serde_json::to_value(&sent[2].payload).unwrap();
    let row = &summary["events"][0];
    assert_eq!(row["type"], SUMMARY_RECORD_TYPE);
    assert_eq!(row["participantId"], "p3");
    assert_eq!(row["totalSessionMs"], 1200);
    assert_eq!(row["articleTimes"][0]["modalViewMs"], 1200);
    assert_eq!(row["articleTimes"][0]["trafficLightStatus"], "red");
}

#[tokio::test]
async fn test_signals_after_end_are_ignored() {
    let (mut tracker, _) = tracker(collector_config(), Some("pid=p4"));
    tracker.dispose();
    let logged = tracker.log().len();

    let effects = tracker.handle(Signal::Click {
        target: card("2"),
        modal_active: false,
    });
    assert!(effects.is_empty());
    assert_eq!(tracker.log().len(), logged);
    assert!(tracker.pipeline().is_closed());
}

#[tokio::test]
async fn test_first_signal_starts_session() {
    let clock = Arc::new(ManualClock::at_epoch());
    let mut tracker = Tracker::new(TrackerConfig::default(), Arc::new(ArticleCatalog::builtin()), clock);
    assert_eq!(tracker.session().phase(), SessionPhase::NotStarted);

    tracker.handle(Signal::PointerEnter { target: card("1") });
    assert!(tracker.session().is_active());
    assert_eq!(tracker.log().events()[0].kind, EventKind::SessionStart);
    assert_eq!(tracker.log().count_of("hover_start"), 1);
}
