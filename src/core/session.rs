//! Authentication state for one client session.
//!
//! [`SessionController`] owns the `Unknown -> Checking -> Authenticated |
//! Anonymous` state machine and publishes every transition through a
//! [`tokio::sync::watch`] channel. Credential-changing transitions bump a
//! generation counter so that a profile fetch which resolves after logout or
//! expiry cannot resurrect the session.

use crate::api::models::{AuthGrant, EmailVerificationRequest, LoginCredentials, User};
use crate::api::{ApiError, AuthApi};
use crate::core::credentials::CredentialStore;
use crate::core::token::{current_unix_epoch_s, inspect_token, TokenStatus};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unknown,
    Checking,
    Authenticated,
    Anonymous,
}

/// What observers see of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            phase: AuthPhase::Unknown,
            user: None,
            is_loading: true,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success {
        user: User,
    },
    Failure {
        message: String,
        /// The server refused because the email is unverified; callers
        /// should continue with the verification flow for `email`.
        requires_verification: bool,
        email: Option<String>,
    },
}

impl LoginOutcome {
    fn from_error(err: &ApiError) -> Self {
        LoginOutcome::Failure {
            message: err.message().to_string(),
            requires_verification: err.requires_verification(),
            email: err.verification_email(),
        }
    }
}

pub struct SessionController<A: AuthApi> {
    api: Arc<A>,
    credentials: CredentialStore,
    state: watch::Sender<AuthSnapshot>,
    generation: AtomicU64,
}

impl<A: AuthApi> SessionController<A> {
    pub fn new(api: Arc<A>, credentials: CredentialStore) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        Self {
            api,
            credentials,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Resolve the initial state from stored credentials.
    pub async fn mount(&self) -> AuthSnapshot {
        self.state.send_modify(|snapshot| {
            snapshot.phase = AuthPhase::Checking;
            snapshot.is_loading = true;
        });

        if self.api.ensure_csrf().await.is_none() {
            warn!("CSRF token initialization failed; continuing without one");
        }

        let Some(token) = self.credentials.get_token() else {
            self.publish_anonymous(None);
            return self.snapshot();
        };

        match inspect_token(&token, current_unix_epoch_s()) {
            TokenStatus::Expired => {
                info!("stored token has expired");
                self.end_session();
            }
            TokenStatus::Invalid => {
                warn!("stored token is undecodable; discarding it");
                self.end_session();
            }
            TokenStatus::Valid(_) => match self.credentials.get_profile() {
                Some(user) => self.publish_authenticated(user),
                None => self.fetch_profile().await,
            },
        }

        self.snapshot()
    }

    async fn fetch_profile(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let result = self.api.current_user().await;

        if !self.is_current(generation) {
            debug!("discarding profile fetch that resolved after the session changed");
            if self.generation.load(Ordering::SeqCst) == generation {
                // The token vanished or expired underneath us without a
                // transition being published; settle on anonymous.
                self.end_session();
            }
            return;
        }

        match result {
            Ok(user) => {
                if let Err(err) = self.credentials.set_profile(&user) {
                    warn!(error = %err, "could not cache profile");
                }
                self.publish_authenticated(user);
            }
            Err(err) => {
                warn!(error = %err, "auth check failed");
                self.end_session();
            }
        }
    }

    /// True while no credential-changing transition has happened since
    /// `generation` was read and the stored token is still usable.
    fn is_current(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.credentials.get_token().is_some_and(|token| {
            matches!(
                inspect_token(&token, current_unix_epoch_s()),
                TokenStatus::Valid(_)
            )
        })
    }

    /// One tick of the expiry watch: if the stored token is past its expiry
    /// (or no longer decodes), drop the session. Returns true when it did.
    pub fn check_expiry(&self) -> bool {
        let Some(token) = self.credentials.get_token() else {
            return false;
        };
        match inspect_token(&token, current_unix_epoch_s()) {
            TokenStatus::Valid(_) => false,
            TokenStatus::Expired => {
                info!("token expired; ending session");
                self.end_session();
                true
            }
            TokenStatus::Invalid => {
                warn!("token validation failed; ending session");
                self.end_session();
                true
            }
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> LoginOutcome {
        self.begin_request();
        match self.api.login(credentials).await {
            Ok(grant) => self.establish(grant),
            Err(err) => self.fail_request(&err),
        }
    }

    /// Confirm an account's email. The server signs the user in on success,
    /// so the grant is persisted exactly as for a login.
    pub async fn verify_email(&self, request: &EmailVerificationRequest) -> LoginOutcome {
        self.begin_request();
        match self.api.verify_email(request).await {
            Ok(grant) => self.establish(grant),
            Err(err) => self.fail_request(&err),
        }
    }

    fn begin_request(&self) {
        self.state.send_modify(|snapshot| {
            snapshot.is_loading = true;
            snapshot.error = None;
        });
    }

    fn fail_request(&self, err: &ApiError) -> LoginOutcome {
        let message = err.message().to_string();
        self.state.send_modify(|snapshot| {
            snapshot.is_loading = false;
            snapshot.error = Some(message);
        });
        LoginOutcome::from_error(err)
    }

    fn establish(&self, grant: AuthGrant) -> LoginOutcome {
        let persisted = self
            .credentials
            .set_token(&grant.access)
            .and_then(|()| self.credentials.set_profile(&grant.user));
        if let Err(err) = persisted {
            warn!(error = %err, "could not persist session");
            self.credentials.clear_all();
            let message = format!("Could not save session: {err}");
            self.state.send_modify(|snapshot| {
                snapshot.is_loading = false;
                snapshot.error = Some(message.clone());
            });
            return LoginOutcome::Failure {
                message,
                requires_verification: false,
                email: None,
            };
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish_authenticated(grant.user.clone());
        LoginOutcome::Success { user: grant.user }
    }

    /// Wipe credentials, go anonymous, then run `on_complete` exactly once.
    /// Nothing that happens while clearing can prevent the callback.
    pub fn logout<F: FnOnce()>(&self, on_complete: F) {
        self.state.send_modify(|snapshot| snapshot.is_loading = true);

        if catch_unwind(AssertUnwindSafe(|| self.credentials.clear_all())).is_err() {
            warn!("clearing credentials panicked; session state reset anyway");
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish_anonymous(None);

        on_complete();
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|snapshot| snapshot.error = None);
    }

    fn end_session(&self) {
        self.credentials.clear_all();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish_anonymous(None);
    }

    fn publish_authenticated(&self, user: User) {
        self.state.send_modify(|snapshot| {
            snapshot.phase = AuthPhase::Authenticated;
            snapshot.user = Some(user);
            snapshot.is_loading = false;
            snapshot.error = None;
        });
    }

    fn publish_anonymous(&self, error: Option<String>) {
        self.state.send_modify(|snapshot| {
            snapshot.phase = AuthPhase::Anonymous;
            snapshot.user = None;
            snapshot.is_loading = false;
            snapshot.error = error;
        });
    }
}

impl<A: AuthApi + 'static> SessionController<A> {
    /// Re-check the stored token every `period` until the returned handle is
    /// stopped or dropped, or the controller itself goes away.
    pub fn spawn_expiry_watch(self: &Arc<Self>, period: Duration) -> ExpiryWatch {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let controller: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(controller) = controller.upgrade() else {
                            break;
                        };
                        controller.check_expiry();
                    }
                }
            }
        });

        ExpiryWatch {
            cancel,
            handle: Some(handle),
        }
    }
}

/// Handle to a running expiry watch.
pub struct ExpiryWatch {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryWatch {
    /// Stop the loop and wait for it to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ExpiryWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
