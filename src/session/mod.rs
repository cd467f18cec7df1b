//! Session holder: owns the current access token, persists it, and keeps it alive
//! through a refresh chain. Login and register store the issued tokens and arm the
//! chain; logout cancels it and forgets both tokens. A failed chain signs the
//! session out.

pub mod refresh;
pub mod store;

pub use refresh::{
    schedule_refresh, AuthApi, Callbacks, RefreshConfig, RefreshError, RefreshEvent,
    RefreshHandle, RefreshListener, RefreshScheduler, RefreshState, StalePolicy,
};
pub use store::{CredentialStore, FileStore, MemoryStore, StoreError, REFRESH_TOKEN_KEY, TOKEN_KEY};

use crate::{
    api::{ApiClient, ApiError, AuthResponse, Employer},
    token::{self, Clock, SystemClock},
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

type TokenSlot = Arc<RwLock<Option<SecretString>>>;

fn read_token(slot: &TokenSlot) -> Option<SecretString> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write_token(slot: &TokenSlot, token: Option<SecretString>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = token;
}

/// Applies refresh outcomes to the session and forwards them to the owner.
struct SessionListener {
    token: TokenSlot,
    store: Arc<dyn CredentialStore>,
    events: mpsc::UnboundedSender<RefreshEvent>,
}

impl RefreshListener for SessionListener {
    fn on_refresh(&self, token: SecretString) {
        write_token(&self.token, Some(token.clone()));
        if let Err(e) = self.store.set(TOKEN_KEY, &token) {
            warn!("Failed to persist refreshed token: {}", e);
        }
        self.events.on_refresh(token);
    }

    fn on_error(&self, error: RefreshError) {
        warn!("Session refresh failed, signing out: {}", error);
        write_token(&self.token, None);
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            error!("Failed to clear stored token: {}", e);
        }
        self.events.on_error(error);
    }
}

pub struct Session {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    token: TokenSlot,
    scheduler: RefreshScheduler,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::UnboundedReceiver<RefreshEvent>>,
}

impl Session {
    /// Opens a session, hydrating the access token from `store`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn open(
        api: ApiClient,
        store: Arc<dyn CredentialStore>,
        config: RefreshConfig,
    ) -> Result<Self, SessionError> {
        Self::open_with_clock(api, store, config, Arc::new(SystemClock))
    }

    /// [`Session::open`] with an explicit wall clock.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn open_with_clock(
        api: ApiClient,
        store: Arc<dyn CredentialStore>,
        config: RefreshConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let token: TokenSlot = Arc::new(RwLock::new(store.get(TOKEN_KEY)?));
        let (tx, rx) = mpsc::unbounded_channel();

        let listener = Arc::new(SessionListener {
            token: Arc::clone(&token),
            store: Arc::clone(&store),
            events: tx,
        });

        let scheduler =
            RefreshScheduler::new(Arc::new(api.clone()), Arc::clone(&store), listener, config)
                .with_clock(Arc::clone(&clock));

        Ok(Self {
            api,
            store,
            token,
            scheduler,
            clock,
            events: Some(rx),
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        read_token(&self.token)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Whether a refresh credential is stored. Unreadable storage counts as none.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        matches!(self.store.get(REFRESH_TOKEN_KEY), Ok(Some(_)))
    }

    #[must_use]
    pub fn refresh_state(&self) -> RefreshState {
        self.scheduler.state()
    }

    /// True when there is no token, or it is inside the refresh threshold.
    #[must_use]
    pub fn is_expiring_soon(&self) -> bool {
        self.token().map_or(true, |token| {
            token::is_expiring_soon(
                token.expose_secret(),
                self.scheduler.threshold(),
                self.clock.now_ms(),
            )
        })
    }

    /// Takes the stream of refresh outcomes. Only the first call gets it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RefreshEvent>> {
        self.events.take()
    }

    /// The current token, or an error when signed out.
    ///
    /// # Errors
    /// Returns `NotAuthenticated` when no token is held.
    pub fn require_token(&self) -> Result<SecretString, SessionError> {
        self.token().ok_or(SessionError::NotAuthenticated)
    }

    /// # Errors
    /// Returns an error if the credentials are rejected or the tokens cannot be stored.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), SessionError> {
        let response = self.api.login(email, password).await?;
        self.establish(response)?;
        info!("signed in");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the account is refused or the tokens cannot be stored.
    #[instrument(skip(self, employer), fields(email = %employer.email))]
    pub async fn register(&self, employer: &Employer) -> Result<(), SessionError> {
        let response = self.api.register(employer).await?;
        self.establish(response)?;
        info!("account created");
        Ok(())
    }

    /// Forgets both tokens and cancels the refresh chain.
    ///
    /// # Errors
    /// Returns an error if the store cannot be cleared; the in-memory session is
    /// signed out regardless.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.scheduler.cancel();
        write_token(&self.token, None);

        // both keys are attempted; the first failure is reported
        let token = self.store.remove(TOKEN_KEY);
        let refresh = self.store.remove(REFRESH_TOKEN_KEY);
        if let Err(e) = &refresh {
            error!("Failed to clear stored refresh token: {}", e);
        }
        token.and(refresh)?;

        info!("signed out");
        Ok(())
    }

    /// Arms the refresh chain for a token hydrated from storage.
    pub fn resume(&self) -> Option<RefreshHandle> {
        self.token().map(|token| self.scheduler.start(&token))
    }

    /// Refreshes right away when the held token is inside the threshold. Used by
    /// one-shot commands that do not keep a chain running. A refreshed token
    /// re-arms the chain from its own expiry; a failure cancels it.
    ///
    /// # Errors
    /// Returns `NotAuthenticated` when signed out, or the refresh failure, in which
    /// case the session is signed out.
    pub async fn ensure_fresh(&self) -> Result<SecretString, SessionError> {
        let current = self.require_token()?;
        if !self.is_expiring_soon() {
            return Ok(current);
        }

        debug!("access token expiring; refreshing before use");

        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or(RefreshError::MissingCredential);

        let refreshed = match refresh_token {
            Ok(refresh_token) => self
                .api
                .refresh(&refresh_token)
                .await
                .map_err(RefreshError::Rejected),
            Err(e) => Err(e),
        };

        match refreshed {
            Ok(response) => {
                let token = SecretString::from(response.access_token);
                write_token(&self.token, Some(token.clone()));
                self.store.set(TOKEN_KEY, &token)?;
                self.scheduler.start(&token);
                Ok(token)
            }
            Err(e) => {
                self.scheduler.cancel();
                self.sign_out_local();
                Err(e.into())
            }
        }
    }

    /// Drops the access token after the API refused it.
    pub fn expire(&self) {
        warn!("access token rejected by the API; signing out");
        self.scheduler.cancel();
        self.sign_out_local();
    }

    fn sign_out_local(&self) {
        write_token(&self.token, None);
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            error!("Failed to clear stored token: {}", e);
        }
    }

    fn establish(&self, response: AuthResponse) -> Result<(), SessionError> {
        let token = SecretString::from(response.token);
        self.store.set(TOKEN_KEY, &token)?;

        match response.refresh_token {
            Some(refresh_token) => {
                self.store
                    .set(REFRESH_TOKEN_KEY, &SecretString::from(refresh_token))?;
            }
            None => debug!("no refresh token issued; keeping the stored one"),
        }

        write_token(&self.token, Some(token.clone()));
        self.scheduler.start(&token);
        Ok(())
    }
}
