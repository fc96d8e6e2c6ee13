use std::sync::{Arc, RwLock};

use bharatmart_auth::{Argon2Hasher, AuthenticatorTrait, JwtAuthenticator};
use bharatmart_cache::CacheService;
use bharatmart_db::{DatabaseAdapter, DatabaseKind};
use bharatmart_jobs::QueueService;

/// Shared application state passed to every route handler.
pub struct AppState {
    pub db: Arc<dyn DatabaseAdapter>,
    pub cache: CacheService,
    pub queues: QueueService,
    /// Issues and verifies the tokens handed out by the auth routes.
    pub tokens: JwtAuthenticator,
    pub hasher: Argon2Hasher,
    // Use an Arc-wrapped RwLock to allow swapping the inner Arc<T> atomically.
    authenticator: Arc<RwLock<Arc<dyn AuthenticatorTrait>>>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            cache: self.cache.clone(),
            queues: self.queues.clone(),
            tokens: self.tokens.clone(),
            hasher: self.hasher.clone(),
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

impl AppState {
    /// Build a fully initialised state container from its constituent parts.
    /// Request authentication defaults to verifying `tokens`.
    pub fn new(
        db: Arc<dyn DatabaseAdapter>,
        cache: CacheService,
        queues: QueueService,
        tokens: JwtAuthenticator,
    ) -> Self {
        let authenticator: Arc<dyn AuthenticatorTrait> = Arc::new(tokens.clone());
        Self {
            db,
            cache,
            queues,
            tokens,
            hasher: Argon2Hasher::new(),
            authenticator: Arc::new(RwLock::new(authenticator)),
        }
    }

    pub fn with_hasher(mut self, hasher: Argon2Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[inline]
    pub fn database_kind(&self) -> DatabaseKind {
        self.db.kind()
    }

    /// Atomically get a clone of the current authenticator.
    pub fn authenticator(&self) -> Arc<dyn AuthenticatorTrait> {
        match self.authenticator.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Atomically swap the authenticator, returning the previous one.
    pub fn swap_authenticator(
        &self,
        new: Arc<dyn AuthenticatorTrait>,
    ) -> Arc<dyn AuthenticatorTrait> {
        let mut guard = match self.authenticator.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, new)
    }
}
