use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Query parameter carrying the participant id on the launch URL.
pub const PARTICIPANT_PARAM: &str = "pid";

// Base used to resolve bare query strings ("?pid=abc") and relative launch paths.
const LAUNCH_BASE: &str = "http://launch.invalid/";

/// Opaque participant identifier. Never invented: absent means `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the participant id from launch parameters.
///
/// Accepts a full URL (`https://host/feed?pid=abc`), a relative path or a bare
/// query string (`?pid=abc`, `pid=abc`). Anything malformed yields `None`.
pub fn participant_from_launch(launch: &str) -> Option<ParticipantId> {
    let launch = launch.trim();
    if launch.is_empty() {
        return None;
    }

    let parsed = match Url::parse(launch) {
        Ok(url) => url,
        Err(_) => {
            let base = Url::parse(LAUNCH_BASE).ok()?;
            let relative = if launch.contains('?') || launch.starts_with('/') {
                launch.to_string()
            } else {
                format!("?{}", launch)
            };
            base.join(&relative).ok()?
        }
    };

    parsed
        .query_pairs()
        .find(|(key, _)| key == PARTICIPANT_PARAM)
        .and_then(|(_, value)| ParticipantId::new(value.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url() {
        let pid = participant_from_launch("https://study.example/feed/index.html?pid=P-042&cond=b");
        assert_eq!(pid.map(|p| p.to_string()), Some("P-042".to_string()));
    }

    #[test]
    fn test_bare_query_forms() {
        assert_eq!(participant_from_launch("?pid=abc").unwrap().as_str(), "abc");
        assert_eq!(participant_from_launch("pid=abc").unwrap().as_str(), "abc");
        assert_eq!(participant_from_launch("/feed?pid=x%20y").unwrap().as_str(), "x y");
    }

    #[test]
    fn test_missing_or_empty_is_none() {
        assert!(participant_from_launch("").is_none());
        assert!(participant_from_launch("https://study.example/feed").is_none());
        assert!(participant_from_launch("?pid=").is_none());
        assert!(participant_from_launch("?other=1").is_none());
    }
}
