//! Control messages posted by the foreground.

use serde::{Deserialize, Serialize};

/// A control message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Promote a waiting agent to active now.
    SkipWaiting,
    /// Fetch and store a list of URLs, best effort per URL.
    #[serde(rename_all = "camelCase")]
    CacheUrls {
        urls: Vec<String>,
        #[serde(default)]
        cache_name: Option<String>,
    },
    /// Fetch and store one user-added picture.
    CacheUserPicture { url: String },
}

/// A URL that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub error: String,
}

/// Result of a caching control message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub cache: String,
    pub stored: Vec<String>,
    pub failed: Vec<FailedUrl>,
}

impl CacheReport {
    pub(crate) fn new(cache: impl Into<String>) -> Self {
        Self { cache: cache.into(), ..Self::default() }
    }

    pub(crate) fn fail(&mut self, url: &str, error: impl ToString) {
        self.failed.push(FailedUrl { url: url.to_string(), error: error.to_string() });
    }
}

/// What handling a control message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    SkippedWaiting { promoted: bool },
    Cached(CacheReport),
}

impl ControlOutcome {
    /// One-line summary for acknowledgements.
    pub fn message(&self) -> String {
        match self {
            ControlOutcome::SkippedWaiting { promoted: true } => "agent activated".to_string(),
            ControlOutcome::SkippedWaiting { promoted: false } => "skip-waiting recorded".to_string(),
            ControlOutcome::Cached(report) => {
                format!("cached {} of {} into {}", report.stored.len(), report.stored.len() + report.failed.len(), report.cache)
            }
        }
    }

    pub fn stored(&self) -> usize {
        match self {
            ControlOutcome::Cached(report) => report.stored.len(),
            ControlOutcome::SkippedWaiting { .. } => 0,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            ControlOutcome::Cached(report) => report.failed.len(),
            ControlOutcome::SkippedWaiting { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_messages() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);

        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"CACHE_URLS","urls":["/a.svg"],"cacheName":"pictoh-assets-v1"}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::CacheUrls { urls: vec!["/a.svg".into()], cache_name: Some("pictoh-assets-v1".into()) }
        );

        let msg: ControlMessage = serde_json::from_str(r#"{"type":"CACHE_URLS","urls":[]}"#).unwrap();
        assert_eq!(msg, ControlMessage::CacheUrls { urls: vec![], cache_name: None });

        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"CACHE_USER_PICTURE","url":"/user-pictures/cat.png"}"#).unwrap();
        assert_eq!(msg, ControlMessage::CacheUserPicture { url: "/user-pictures/cat.png".into() });
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"CLEAR_EVERYTHING"}"#).is_err());
    }

    #[test]
    fn test_outcome_message() {
        let mut report = CacheReport::new("pictoh-images-v1");
        report.stored.push("/a.svg".into());
        report.fail("/b.svg", "NETWORK_ERROR: offline");
        let outcome = ControlOutcome::Cached(report);

        assert_eq!(outcome.message(), "cached 1 of 2 into pictoh-images-v1");
        assert_eq!(outcome.stored(), 1);
        assert_eq!(outcome.failed(), 1);
    }
}
