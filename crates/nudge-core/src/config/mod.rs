//! Firebase project configuration.
//!
//! The project id and web API key are public values that identify the
//! Firebase project; user credentials never live here.

use std::env;
use std::time::Duration;

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_PROJECT_ID: &str = "NUDGE_FIREBASE_PROJECT_ID";
const ENV_API_KEY: &str = "NUDGE_FIREBASE_API_KEY";
const ENV_POLL_SECS: &str = "NUDGE_SYNC_POLL_SECS";

const DEFAULT_POLL_SECS: u64 = 5;
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firebase project settings used by the document store and identity clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
    /// How often the change listener polls for remote changes
    pub poll_interval: Duration,
}

impl FirebaseConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when nothing is set and an error for a partial set.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Root of the project's default database documents.
    #[must_use]
    pub fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    /// REST URL for the documents root.
    #[must_use]
    pub fn documents_url(&self) -> String {
        format!("{FIRESTORE_BASE_URL}/{}", self.documents_root())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<FirebaseConfig>> {
    let project_id = normalize_text_option(lookup(ENV_PROJECT_ID));
    let api_key = normalize_text_option(lookup(ENV_API_KEY));
    let poll_secs = normalize_text_option(lookup(ENV_POLL_SECS));

    let (project_id, api_key) = match (project_id, api_key) {
        (None, None) if poll_secs.is_none() => return Ok(None),
        (Some(project_id), Some(api_key)) => (project_id, api_key),
        (project_id, _) => {
            let missing = if project_id.is_none() {
                ENV_PROJECT_ID
            } else {
                ENV_API_KEY
            };
            return Err(Error::Config(format!(
                "Firebase configuration is incomplete. Missing: {missing}"
            )));
        }
    };

    if project_id.contains('/') {
        return Err(Error::Config(format!(
            "{ENV_PROJECT_ID} must not contain '/'"
        )));
    }

    let mut config = FirebaseConfig::new(project_id, api_key);
    if let Some(raw) = poll_secs {
        let secs: u64 = raw.parse().map_err(|_| {
            Error::Config(format!("{ENV_POLL_SECS} must be a whole number of seconds"))
        })?;
        if secs == 0 {
            return Err(Error::Config(format!("{ENV_POLL_SECS} must be at least 1")));
        }
        config.poll_interval = Duration::from_secs(secs);
    }

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<FirebaseConfig>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn empty_environment_means_unconfigured() {
        assert!(parse_from_map(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn partial_configuration_names_missing_variable() {
        let map = HashMap::from([(ENV_PROJECT_ID, "nudge-app")]);
        let err = parse_from_map(&map).unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.contains(ENV_API_KEY)));
    }

    #[test]
    fn poll_interval_alone_is_incomplete() {
        let map = HashMap::from([(ENV_POLL_SECS, "10")]);
        assert!(parse_from_map(&map).is_err());
    }

    #[test]
    fn parses_complete_configuration() {
        let map = HashMap::from([
            (ENV_PROJECT_ID, " nudge-app "),
            (ENV_API_KEY, "web-key"),
            (ENV_POLL_SECS, "12"),
        ]);

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.project_id, "nudge-app");
        assert_eq!(config.poll_interval, Duration::from_secs(12));
        assert_eq!(
            config.documents_url(),
            "https://firestore.googleapis.com/v1/projects/nudge-app/databases/(default)/documents"
        );
    }

    #[test]
    fn rejects_zero_or_invalid_poll_interval() {
        for value in ["0", "soon"] {
            let map = HashMap::from([
                (ENV_PROJECT_ID, "nudge-app"),
                (ENV_API_KEY, "web-key"),
                (ENV_POLL_SECS, value),
            ]);
            assert!(parse_from_map(&map).is_err(), "{value}");
        }
    }
}
