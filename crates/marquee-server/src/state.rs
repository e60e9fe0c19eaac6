//! Shared application state.

use crate::mailer::{Mailer, Notification};
use crate::middleware::metrics::HttpMetrics;
use marquee_auth::{PermissionRegistry, TokenLedger};
use marquee_control::{AccessDecisionSequencer, BackgroundTasks, ConcurrencyGuard, RateLimiter};
use marquee_core::model::{Movie, User};
use marquee_core::{
    AppConfig, MovieStore, PermissionStore, StoreDiagnostics, TokenStore, UserStore,
};
use std::sync::Arc;

/// Cheap to clone; every handler gets its own copy.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    users: Arc<dyn UserStore>,
    movies: Arc<dyn MovieStore>,
    ledger: TokenLedger,
    permissions: PermissionRegistry,
    access: AccessDecisionSequencer,
    user_guard: ConcurrencyGuard<User, dyn UserStore>,
    movie_guard: ConcurrencyGuard<Movie, dyn MovieStore>,
    tasks: Arc<BackgroundTasks>,
    mailer: Arc<dyn Mailer>,
    metrics: HttpMetrics,
    diagnostics: Arc<dyn StoreDiagnostics>,
}

impl AppState {
    /// Wire every component over one backing store.
    ///
    /// Fails only if the metrics registry rejects a collector.
    pub fn new<S>(
        config: AppConfig,
        store: Arc<S>,
        mailer: Arc<dyn Mailer>,
    ) -> prometheus::Result<Self>
    where
        S: UserStore + MovieStore + TokenStore + PermissionStore + StoreDiagnostics + 'static,
    {
        let users: Arc<dyn UserStore> = store.clone();
        let movies: Arc<dyn MovieStore> = store.clone();
        let tokens: Arc<dyn TokenStore> = store.clone();
        let grants: Arc<dyn PermissionStore> = store.clone();
        let diagnostics: Arc<dyn StoreDiagnostics> = store;

        let ledger = TokenLedger::new(tokens, users.clone());
        let permissions =
            PermissionRegistry::new(grants, config.permissions.default_grants.clone());
        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        let access = AccessDecisionSequencer::new(limiter, ledger.clone(), permissions.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                user_guard: ConcurrencyGuard::new(users.clone()),
                movie_guard: ConcurrencyGuard::new(movies.clone()),
                config,
                users,
                movies,
                ledger,
                permissions,
                access,
                tasks: Arc::new(BackgroundTasks::new()),
                mailer,
                metrics: HttpMetrics::new()?,
                diagnostics,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.inner.users
    }

    pub fn movies(&self) -> &Arc<dyn MovieStore> {
        &self.inner.movies
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.inner.ledger
    }

    pub fn permissions(&self) -> &PermissionRegistry {
        &self.inner.permissions
    }

    pub fn access(&self) -> &AccessDecisionSequencer {
        &self.inner.access
    }

    pub fn user_guard(&self) -> &ConcurrencyGuard<User, dyn UserStore> {
        &self.inner.user_guard
    }

    pub fn movie_guard(&self) -> &ConcurrencyGuard<Movie, dyn MovieStore> {
        &self.inner.movie_guard
    }

    pub fn tasks(&self) -> &Arc<BackgroundTasks> {
        &self.inner.tasks
    }

    pub fn metrics(&self) -> &HttpMetrics {
        &self.inner.metrics
    }

    pub fn diagnostics(&self) -> &Arc<dyn StoreDiagnostics> {
        &self.inner.diagnostics
    }

    /// Deliver `notification` in the background; failures are logged.
    pub fn notify(&self, recipient: String, notification: Notification) {
        let mailer = Arc::clone(&self.inner.mailer);
        self.inner.tasks.spawn("notification", async move {
            if let Err(e) = mailer.send(&recipient, &notification).await {
                tracing::error!(
                    template = notification.template(),
                    error = %e,
                    "failed to send notification"
                );
            }
        });
    }
}
