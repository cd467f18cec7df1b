//! Proactive access-token refresh.
//!
//! A refresh chain keeps one session alive without polling:
//! 1. `start` decodes the token's `exp` and arms a one-shot timer for
//!    `exp - now - threshold`.
//! 2. When the timer fires, the stored refresh credential is exchanged for a new
//!    access token, the listener receives it, and the timer is re-armed from the
//!    new token's expiry.
//! 3. Any failure is reported once through the listener and ends the chain; nothing
//!    is retried here.
//!
//! Every `start` bumps a generation counter. The chain task captures its generation
//! and checks it before each step, so a superseded or cancelled chain can never
//! refresh or notify, even if its timer or request was already in flight.

use crate::{
    api::{ApiError, RefreshResponse},
    session::store::{CredentialStore, REFRESH_TOKEN_KEY},
    token::{self, Clock, DecodeError, SystemClock, DEFAULT_REFRESH_THRESHOLD},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, instrument, warn};

/// Exchanges a refresh credential for a new access token.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshResponse, ApiError>;
}

/// Receives the outcome of each refresh. Both hooks are synchronous and run while
/// the scheduler holds its slot, so they must not call back into the scheduler or
/// a [`RefreshHandle`].
pub trait RefreshListener: Send + Sync {
    fn on_refresh(&self, token: SecretString);
    fn on_error(&self, error: RefreshError);
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingCredential,
    #[error("refresh rejected: {0}")]
    Rejected(#[source] ApiError),
    #[error("refreshed token could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("refreshed token expires in {remaining_ms} ms, inside the refresh threshold")]
    ExpiresTooSoon { remaining_ms: i64 },
}

/// What `start` does with a token that is already inside the threshold, expired, or
/// undecodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Refresh right away.
    #[default]
    RefreshNow,
    /// Arm nothing and stay idle; the caller decides what to do.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    pub threshold: Duration,
    pub stale_policy: StalePolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_REFRESH_THRESHOLD,
            stale_policy: StalePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Armed,
    Refreshing,
    Failed,
}

/// Channel form of [`RefreshListener`].
#[derive(Debug)]
pub enum RefreshEvent {
    Refreshed(SecretString),
    Failed(RefreshError),
}

impl RefreshListener for mpsc::UnboundedSender<RefreshEvent> {
    fn on_refresh(&self, token: SecretString) {
        if self.send(RefreshEvent::Refreshed(token)).is_err() {
            debug!("refresh event receiver dropped");
        }
    }

    fn on_error(&self, error: RefreshError) {
        if self.send(RefreshEvent::Failed(error)).is_err() {
            debug!("refresh event receiver dropped");
        }
    }
}

/// Closure pair form of [`RefreshListener`].
pub struct Callbacks<R, E> {
    on_refresh: R,
    on_error: E,
}

impl<R, E> Callbacks<R, E>
where
    R: Fn(SecretString) + Send + Sync,
    E: Fn(RefreshError) + Send + Sync,
{
    pub fn new(on_refresh: R, on_error: E) -> Self {
        Self {
            on_refresh,
            on_error,
        }
    }
}

impl<R, E> RefreshListener for Callbacks<R, E>
where
    R: Fn(SecretString) + Send + Sync,
    E: Fn(RefreshError) + Send + Sync,
{
    fn on_refresh(&self, token: SecretString) {
        (self.on_refresh)(token);
    }

    fn on_error(&self, error: RefreshError) {
        (self.on_error)(error);
    }
}

struct Slot {
    generation: u64,
    state: RefreshState,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    slot: Mutex<Slot>,
}

impl Shared {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                generation: 0,
                state: RefreshState::Idle,
                task: None,
            }),
        }
    }

    // the lock is never held across an await, so a poisoned slot is still consistent
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the chain `generation` to `state`, unless it has been superseded.
    fn transition(&self, generation: u64, state: RefreshState) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        slot.state = state;
        if state == RefreshState::Failed {
            slot.task = None;
        }
        true
    }

    /// Moves the chain `generation` to `state` and runs `notify` while still holding
    /// the slot, so a `cancel` that returns first always wins over the delivery.
    fn settle(&self, generation: u64, state: RefreshState, notify: impl FnOnce()) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        slot.state = state;
        if state == RefreshState::Failed {
            slot.task = None;
        }
        notify();
        true
    }

    /// Invalidates the current chain. Returns the state it was in.
    fn cancel(&self, generation: Option<u64>) -> Option<RefreshState> {
        let mut slot = self.lock();
        if generation.is_some_and(|generation| generation != slot.generation) {
            return None;
        }
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        let previous = slot.state;
        slot.state = RefreshState::Idle;
        Some(previous)
    }
}

/// Cancels one refresh chain. Cancelling a chain that has already been superseded
/// by a later `start` does nothing.
#[derive(Clone)]
pub struct RefreshHandle {
    shared: Arc<Shared>,
    generation: u64,
}

impl RefreshHandle {
    /// Returns true if this call invalidated a live chain.
    pub fn cancel(&self) -> bool {
        match self.shared.cancel(Some(self.generation)) {
            Some(previous) => {
                debug!(generation = self.generation, ?previous, "refresh chain cancelled");
                true
            }
            None => false,
        }
    }

    /// True while this chain is still the scheduler's current one and not finished.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let slot = self.shared.lock();
        slot.generation == self.generation
            && matches!(slot.state, RefreshState::Armed | RefreshState::Refreshing)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Everything a chain task needs, cloned out of the scheduler.
#[derive(Clone)]
struct Chain {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    listener: Arc<dyn RefreshListener>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
    shared: Arc<Shared>,
}

pub struct RefreshScheduler {
    chain: Chain,
    stale_policy: StalePolicy,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn CredentialStore>,
        listener: Arc<dyn RefreshListener>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            chain: Chain {
                auth,
                store,
                listener,
                clock: Arc::new(SystemClock),
                threshold: config.threshold,
                shared: Arc::new(Shared::new()),
            },
            stale_policy: config.stale_policy,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.chain.clock = clock;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.chain.threshold
    }

    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.chain.shared.lock().state
    }

    /// Arms a refresh chain for `token`, superseding any chain already running.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip_all)]
    pub fn start(&self, token: &SecretString) -> RefreshHandle {
        let now = self.chain.clock.now_ms();

        let delay = match token::refresh_delay_ms(token.expose_secret(), self.chain.threshold, now)
        {
            Ok(delay_ms) if delay_ms > 0 => Some(millis(delay_ms)),
            Ok(delay_ms) => {
                debug!(delay_ms, "token already inside the refresh threshold");
                self.stale_delay()
            }
            Err(e) => {
                // undecodable tokens are treated as expiring now
                warn!("Failed to decode access token: {}", e);
                self.stale_delay()
            }
        };

        let shared = Arc::clone(&self.chain.shared);
        let mut slot = shared.lock();
        slot.generation += 1;
        let generation = slot.generation;

        if let Some(task) = slot.task.take() {
            task.abort();
        }

        match delay {
            Some(delay) => {
                slot.state = RefreshState::Armed;
                slot.task = Some(tokio::spawn(run_chain(self.chain.clone(), generation, delay)));
                info!(
                    generation,
                    next_refresh_ms = delay.as_millis(),
                    "token refresh scheduled"
                );
            }
            None => {
                slot.state = RefreshState::Idle;
                info!(generation, "token inside refresh threshold; no refresh scheduled");
            }
        }
        drop(slot);

        RefreshHandle { shared, generation }
    }

    /// Invalidates whatever chain is current. A late timer or in-flight refresh
    /// belonging to it becomes a no-op.
    pub fn cancel(&self) {
        if let Some(previous) = self.chain.shared.cancel(None) {
            debug!(?previous, "refresh scheduler cancelled");
        }
    }

    fn stale_delay(&self) -> Option<Duration> {
        match self.stale_policy {
            StalePolicy::RefreshNow => Some(Duration::ZERO),
            StalePolicy::Skip => None,
        }
    }
}

/// Arms a refresh chain with closure callbacks and default settings, returning the
/// handle that cancels it.
///
/// Must be called from within a tokio runtime.
pub fn schedule_refresh<R, E>(
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    access_token: &SecretString,
    on_refresh: R,
    on_error: E,
) -> RefreshHandle
where
    R: Fn(SecretString) + Send + Sync + 'static,
    E: Fn(RefreshError) + Send + Sync + 'static,
{
    RefreshScheduler::new(
        auth,
        store,
        Arc::new(Callbacks::new(on_refresh, on_error)),
        RefreshConfig::default(),
    )
    .start(access_token)
}

fn millis(delay_ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0))
}

async fn run_chain(chain: Chain, generation: u64, mut delay: Duration) {
    loop {
        if !delay.is_zero() {
            sleep(delay).await;
        }

        if !chain.shared.transition(generation, RefreshState::Refreshing) {
            debug!(generation, "stale refresh timer ignored");
            return;
        }

        let token = match refresh_once(&chain).await {
            Ok(token) => token,
            Err(e) => {
                chain.shared.settle(generation, RefreshState::Failed, || {
                    error!("Failed to refresh access token: {}", e);
                    chain.listener.on_error(e);
                });
                return;
            }
        };

        // the new token is delivered even if it cannot be scheduled from
        match next_delay(&chain, &token) {
            Ok(next) => {
                let delivered = chain.shared.settle(generation, RefreshState::Armed, || {
                    chain.listener.on_refresh(token);
                });
                if !delivered {
                    debug!(generation, "refresh finished after cancellation; discarded");
                    return;
                }
                info!(
                    generation,
                    next_refresh_ms = next.as_millis(),
                    "access token refreshed"
                );
                delay = next;
            }
            Err(e) => {
                chain.shared.settle(generation, RefreshState::Failed, || {
                    chain.listener.on_refresh(token);
                    error!("Cannot schedule next token refresh: {}", e);
                    chain.listener.on_error(e);
                });
                return;
            }
        }
    }
}

async fn refresh_once(chain: &Chain) -> Result<SecretString, RefreshError> {
    let refresh_token = match chain.store.get(REFRESH_TOKEN_KEY) {
        Ok(Some(refresh_token)) => refresh_token,
        Ok(None) => return Err(RefreshError::MissingCredential),
        Err(e) => {
            warn!("Failed to read refresh token: {}", e);
            return Err(RefreshError::MissingCredential);
        }
    };

    let response = chain
        .auth
        .refresh(&refresh_token)
        .await
        .map_err(RefreshError::Rejected)?;

    Ok(SecretString::from(response.access_token))
}

fn next_delay(chain: &Chain, token: &SecretString) -> Result<Duration, RefreshError> {
    let now = chain.clock.now_ms();
    let delay_ms = token::refresh_delay_ms(token.expose_secret(), chain.threshold, now)?;

    if delay_ms > 0 {
        Ok(millis(delay_ms))
    } else {
        Err(RefreshError::ExpiresTooSoon {
            remaining_ms: delay_ms.saturating_add(token::threshold_ms(chain.threshold)),
        })
    }
}
