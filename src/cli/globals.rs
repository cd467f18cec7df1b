use crate::{
    api::{ApiClient, DEFAULT_TIMEOUT},
    session::{CredentialStore, FileStore, RefreshConfig, Session, StalePolicy},
    token::DEFAULT_REFRESH_THRESHOLD,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};

pub const DEFAULT_STATE_FILE: &str = "roster-session.json";

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub state_file: PathBuf,
    pub refresh_threshold: Duration,
    pub timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            threshold: self.refresh_threshold,
            stale_policy: StalePolicy::RefreshNow,
        }
    }

    /// Opens the persisted session against the configured API.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid or the state file cannot be read.
    pub fn open_session(&self) -> Result<Session> {
        let api = ApiClient::new(&self.api_url, self.timeout)
            .with_context(|| format!("invalid API URL {}", self.api_url))?;

        let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new(&self.state_file));

        Session::open(api, store, self.refresh_config())
            .with_context(|| format!("failed to open session at {}", self.state_file.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new("https://api.roster.tld".to_string());
        assert_eq!(args.api_url, "https://api.roster.tld");
        assert_eq!(args.state_file, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(args.refresh_threshold, Duration::from_secs(180));
        assert_eq!(args.refresh_config().stale_policy, StalePolicy::RefreshNow);
    }

    #[tokio::test]
    async fn open_session_reads_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = GlobalArgs::new("https://api.roster.tld".to_string());
        args.state_file = dir.path().join("session.json");

        let session = args.open_session().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn open_session_rejects_bad_url() {
        let args = GlobalArgs::new("api.roster.tld".to_string());
        assert!(args.open_session().is_err());
    }
}
