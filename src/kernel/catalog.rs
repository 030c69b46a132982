use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::CatalogError;

/// Traffic-light rendering of an article's misleading score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLight {
    Green,
    Yellow,
    Red,
}

/// One article as the feed knows it. The tracker only ever reads
/// `id`, `traffic_light_status` and `misleading_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    pub traffic_light_status: TrafficLight,
    pub misleading_score: u8,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<String>>,
}

/// Enrichment attached to events and aggregate records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMeta {
    pub traffic_light_status: TrafficLight,
    pub misleading_score: u8,
}

// Catalog files written for the feed use numeric ids; DOM attributes are strings.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Read-only article lookup table.
#[derive(Debug, Clone, Default)]
pub struct ArticleCatalog {
    articles: Vec<Article>,
    index: HashMap<String, usize>,
}

impl ArticleCatalog {
    pub fn new(articles: Vec<Article>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(articles.len());
        for (i, article) in articles.iter().enumerate() {
            if index.insert(article.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateId(article.id.clone()));
            }
        }
        Ok(Self { articles, index })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let articles: Vec<Article> = serde_json::from_str(json)?;
        Self::new(articles)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, article_id: &str) -> Option<&Article> {
        self.index.get(article_id).and_then(|&i| self.articles.get(i))
    }

    pub fn meta(&self, article_id: &str) -> Option<ArticleMeta> {
        self.get(article_id).map(|a| ArticleMeta {
            traffic_light_status: a.traffic_light_status,
            misleading_score: a.misleading_score,
        })
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// The ten articles shown in the experiment feed. Body text is not carried.
    pub fn builtin() -> Self {
        const FEED: [(&str, &str, TrafficLight, u8); 10] = [
            ("1", "Swiss Voters Reject 50% Inheritance Tax on Wealthy", TrafficLight::Green, 23),
            ("2", "Kazakhstan Protests Ukrainian Drone Strike on Black Sea Oil Terminal", TrafficLight::Yellow, 45),
            ("3", "Musk Says Optimus Robots Will Build Themselves in Self-Replicating Factories", TrafficLight::Red, 78),
            ("4", "Egypt trains hundreds of Palestinians for future Gaza police force", TrafficLight::Yellow, 52),
            ("5", "Netanyahu Requests Pardon from President Herzog", TrafficLight::Red, 82),
            ("6", "Ukrainian Drone Strikes Caspian Pipeline", TrafficLight::Green, 31),
            ("7", "Renowned Playwright Stoppard Dies at 88", TrafficLight::Green, 15),
            ("8", "UN Urges Israel Torture Investigation", TrafficLight::Yellow, 48),
            ("9", "Budget Analysis Shows Significant Changes in 2012 Policy", TrafficLight::Red, 67),
            ("10", "European Union Announces New Climate Targets", TrafficLight::Green, 28),
        ];

        let articles: Vec<Article> = FEED
            .iter()
            .map(|&(id, title, status, score)| Article {
                id: id.to_string(),
                title: title.to_string(),
                summary: String::new(),
                category: String::new(),
                image: String::new(),
                traffic_light_status: status,
                misleading_score: score,
                content: String::new(),
                related: None,
            })
            .collect();

        let index = articles
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        Self { articles, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = ArticleCatalog::builtin();
        assert_eq!(catalog.len(), 10);
        let meta = catalog.meta("3").unwrap();
        assert_eq!(meta.traffic_light_status, TrafficLight::Red);
        assert_eq!(meta.misleading_score, 78);
        assert!(catalog.meta("99").is_none());
    }

    #[test]
    fn test_numeric_ids_from_json() {
        let json = r#"[
            {"id": 7, "title": "A", "trafficLightStatus": "yellow", "misleadingScore": 50},
            {"id": "x", "title": "B", "trafficLightStatus": "green", "misleadingScore": 5,
             "related": ["A"]}
        ]"#;
        let catalog = ArticleCatalog::from_json(json).unwrap();
        assert_eq!(catalog.meta("7").unwrap().traffic_light_status, TrafficLight::Yellow);
        assert_eq!(catalog.get("x").unwrap().related.as_deref(), Some(&["A".to_string()][..]));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"[
            {"id": 1, "title": "A", "trafficLightStatus": "red", "misleadingScore": 90},
            {"id": "1", "title": "B", "trafficLightStatus": "red", "misleadingScore": 90}
        ]"#;
        assert!(matches!(
            ArticleCatalog::from_json(json),
            Err(CatalogError::DuplicateId(id)) if id == "1"
        ));
    }
}
