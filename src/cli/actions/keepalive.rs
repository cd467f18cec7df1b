use crate::{
    cli::globals::GlobalArgs,
    session::{RefreshEvent, Session},
};
use anyhow::{anyhow, Context, Result};
use std::future::Future;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Keeps the chain running until `shutdown` resolves or the chain fails.
///
/// Returns how many refreshes happened.
///
/// # Errors
/// Returns an error when signed out or when a refresh fails; the session is then
/// signed out.
pub async fn keep_alive<F>(
    session: &Session,
    mut events: UnboundedReceiver<RefreshEvent>,
    shutdown: F,
) -> Result<usize>
where
    F: Future<Output = ()>,
{
    let handle = session
        .resume()
        .ok_or_else(|| anyhow!("not signed in; run `roster login` first"))?;

    tokio::pin!(shutdown);
    let mut refreshed = 0;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RefreshEvent::Refreshed(_)) => {
                    refreshed += 1;
                    info!(refreshed, "access token refreshed");
                }
                Some(RefreshEvent::Failed(e)) => {
                    return Err(e).context("session ended");
                }
                None => break,
            },
            () = &mut shutdown => {
                handle.cancel();
                break;
            }
        }
    }

    Ok(refreshed)
}

/// # Errors
/// Returns an error when signed out or when a refresh fails.
pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let mut session = globals.open_session()?;
    let events = session
        .take_events()
        .context("refresh events already taken")?;

    println!("Keeping the session alive, press Ctrl+C to stop");

    let refreshed = keep_alive(&session, events, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
        }
    })
    .await?;

    println!("Stopped after {refreshed} refresh(es)");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        api::{ApiClient, DEFAULT_TIMEOUT},
        session::{
            CredentialStore, MemoryStore, RefreshConfig, RefreshError, RefreshState,
            REFRESH_TOKEN_KEY, TOKEN_KEY,
        },
        token::{tests::token_expiring_at_ms, Clock, SystemClock},
    };
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn secret(value: String) -> SecretString {
        SecretString::from(value)
    }

    fn open(server: &MockServer, store: Arc<MemoryStore>) -> Session {
        let api = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        Session::open(api, store, RefreshConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn signed_out_is_refused() {
        let server = MockServer::start().await;
        let mut session = open(&server, Arc::new(MemoryStore::new()));
        let events = session.take_events().unwrap();

        let err = keep_alive(&session, events, async {}).await.unwrap_err();
        assert!(err.to_string().starts_with("not signed in"));
    }

    #[tokio::test]
    async fn shutdown_cancels_chain() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        store
            .set(TOKEN_KEY, &secret(token_expiring_at_ms(SystemClock.now_ms() + 3_600_000)))
            .unwrap();

        let mut session = open(&server, store);
        let events = session.take_events().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        stop.send(()).unwrap();

        let refreshed = keep_alive(&session, events, async {
            let _ = stopped.await;
        })
        .await
        .unwrap();

        assert_eq!(refreshed, 0);
        assert_eq!(session.refresh_state(), RefreshState::Idle);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_ends_keepalive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "refresh expired" })),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store
            .set(TOKEN_KEY, &secret(token_expiring_at_ms(SystemClock.now_ms() + 30_000)))
            .unwrap();
        store
            .set(REFRESH_TOKEN_KEY, &secret("refresh-1".to_string()))
            .unwrap();

        let mut session = open(&server, store.clone());
        let events = session.take_events().unwrap();

        let err = keep_alive(&session, events, std::future::pending())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "session ended");
        assert!(matches!(
            err.downcast_ref::<RefreshError>(),
            Some(RefreshError::Rejected(_))
        ));
        assert!(!session.is_authenticated());
        assert!(store.get(TOKEN_KEY).unwrap().is_none());
    }
}
