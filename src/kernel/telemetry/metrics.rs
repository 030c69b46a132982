use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::event::Surface;
use crate::kernel::catalog::{ArticleCatalog, TrafficLight};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleAttentionRecord {
    pub article_id: String,
    pub total_ms: u64,
    pub view_count: u64,
    pub list_view_ms: u64,
    pub modal_view_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverRecord {
    pub article_id: String,
    pub hover_duration_ms: u64,
    pub hover_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLightHoverRecord {
    pub article_id: String,
    pub traffic_light_hover_ms: u64,
    pub traffic_light_hover_count: u64,
}

/// Attention record plus the article's static catalog status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedAttentionRecord {
    #[serde(flatten)]
    pub record: ArticleAttentionRecord,
    pub traffic_light_status: Option<TrafficLight>,
    pub misleading_score: Option<u8>,
}

/// Which aggregate a hover interval feeds. Fixed at hover start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverKind {
    Generic,
    TrafficLight,
}

impl HoverKind {
    pub fn from_flag(is_traffic_light: bool) -> Self {
        if is_traffic_light {
            HoverKind::TrafficLight
        } else {
            HoverKind::Generic
        }
    }
}

/// Per-article aggregates, keyed by article id.
#[derive(Debug, Clone, Default)]
pub struct AttentionLedger {
    articles: BTreeMap<String, ArticleAttentionRecord>,
    hovers: BTreeMap<String, HoverRecord>,
    traffic_light_hovers: BTreeMap<String, TrafficLightHoverRecord>,
}

impl AttentionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn article_mut(&mut self, article_id: &str) -> &mut ArticleAttentionRecord {
        self.articles
            .entry(article_id.to_string())
            .or_insert_with(|| ArticleAttentionRecord {
                article_id: article_id.to_string(),
                ..Default::default()
            })
    }

    pub fn record_view_start(&mut self, article_id: &str) {
        self.article_mut(article_id).view_count += 1;
    }

    /// Commits a closed view interval. Total and per-surface move together.
    pub fn commit_view(&mut self, article_id: &str, surface: Surface, duration_ms: u64) {
        let rec = self.article_mut(article_id);
        rec.total_ms += duration_ms;
        match surface {
            Surface::List => rec.list_view_ms += duration_ms,
            Surface::Modal => rec.modal_view_ms += duration_ms,
        }
    }

    pub fn commit_hover(&mut self, article_id: &str, kind: HoverKind, duration_ms: u64) {
        match kind {
            HoverKind::Generic => {
                let rec = self
                    .hovers
                    .entry(article_id.to_string())
                    .or_insert_with(|| HoverRecord {
                        article_id: article_id.to_string(),
                        ..Default::default()
                    });
                rec.hover_duration_ms += duration_ms;
                rec.hover_count += 1;
            }
            HoverKind::TrafficLight => {
                let rec = self
                    .traffic_light_hovers
                    .entry(article_id.to_string())
                    .or_insert_with(|| TrafficLightHoverRecord {
                        article_id: article_id.to_string(),
                        ..Default::default()
                    });
                rec.traffic_light_hover_ms += duration_ms;
                rec.traffic_light_hover_count += 1;
            }
        }
    }

    pub fn article(&self, article_id: &str) -> Option<&ArticleAttentionRecord> {
        self.articles.get(article_id)
    }

    pub fn hover(&self, article_id: &str) -> Option<&HoverRecord> {
        self.hovers.get(article_id)
    }

    pub fn traffic_light_hover(&self, article_id: &str) -> Option<&TrafficLightHoverRecord> {
        self.traffic_light_hovers.get(article_id)
    }

    pub fn articles(&self) -> impl Iterator<Item = &ArticleAttentionRecord> {
        self.articles.values()
    }

    /// Materializes article records, each enriched from the catalog.
    pub fn enriched_articles(&self, catalog: &ArticleCatalog) -> Vec<EnrichedAttentionRecord> {
        self.articles
            .values()
            .map(|rec| {
                let meta = catalog.meta(&rec.article_id);
                EnrichedAttentionRecord {
                    record: rec.clone(),
                    traffic_light_status: meta.map(|m| m.traffic_light_status),
                    misleading_score: meta.map(|m| m.misleading_score),
                }
            })
            .collect()
    }

    pub fn hover_records(&self) -> Vec<HoverRecord> {
        self.hovers.values().cloned().collect()
    }

    pub fn traffic_light_hover_records(&self) -> Vec<TrafficLightHoverRecord> {
        self.traffic_light_hovers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tracks_surfaces() {
        let mut ledger = AttentionLedger::new();
        ledger.record_view_start("1");
        ledger.commit_view("1", Surface::List, 300);
        ledger.record_view_start("1");
        ledger.commit_view("1", Surface::Modal, 1200);

        let rec = ledger.article("1").unwrap();
        assert_eq!(rec.view_count, 2);
        assert_eq!(rec.total_ms, rec.list_view_ms + rec.modal_view_ms);
        assert_eq!(rec.total_ms, 1500);
    }

    #[test]
    fn test_hover_kinds_are_independent() {
        let mut ledger = AttentionLedger::new();
        ledger.commit_hover("3", HoverKind::TrafficLight, 500);
        assert!(ledger.hover("3").is_none());
        let tl = ledger.traffic_light_hover("3").unwrap();
        assert_eq!((tl.traffic_light_hover_ms, tl.traffic_light_hover_count), (500, 1));
    }

    #[test]
    fn test_enrichment_uses_catalog() {
        let mut ledger = AttentionLedger::new();
        ledger.commit_view("5", Surface::List, 10);
        ledger.commit_view("unknown", Surface::List, 10);

        let enriched = ledger.enriched_articles(&ArticleCatalog::builtin());
        let five = enriched.iter().find(|r| r.record.article_id == "5").unwrap();
        assert_eq!(five.traffic_light_status, Some(TrafficLight::Red));
        assert_eq!(five.misleading_score, Some(82));

        let unknown = enriched.iter().find(|r| r.record.article_id == "unknown").unwrap();
        assert_eq!(unknown.misleading_score, None);

        let value = serde_json::to_value(five).unwrap();
        assert_eq!(value["totalMs"], 10);
        assert_eq!(value["trafficLightStatus"], "red");
    }
}
