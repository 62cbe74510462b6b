use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    services::mailer::{HttpMailDispatcher, LogMailDispatcher, MailDispatcher},
    stores::{
        AuditLog, NotificationLedger, OrderStore, PersonalCartStore, PreconfiguredCartStore,
        ProductCatalog, RecipeCartStore, memory::InMemoryBackend, postgres::PgStores,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub personal_carts: Arc<dyn PersonalCartStore>,
    pub recipe_carts: Arc<dyn RecipeCartStore>,
    pub preconfigured: Arc<dyn PreconfiguredCartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn NotificationLedger>,
    pub mailer: Arc<dyn MailDispatcher>,
    pub audit: Arc<dyn AuditLog>,
    pub submissions: SubmissionRegistry,
}

impl AppState {
    pub fn postgres(config: AppConfig, orm: DatabaseConnection) -> anyhow::Result<Self> {
        let stores = Arc::new(PgStores::new(orm));
        let mailer: Arc<dyn MailDispatcher> = match &config.mail_api_url {
            Some(url) => Arc::new(HttpMailDispatcher::new(
                url.clone(),
                config.mail_api_key.clone(),
            )?),
            None => Arc::new(LogMailDispatcher),
        };
        Ok(Self {
            config: Arc::new(config),
            catalog: stores.clone(),
            personal_carts: stores.clone(),
            recipe_carts: stores.clone(),
            preconfigured: stores.clone(),
            orders: stores.clone(),
            ledger: stores.clone(),
            mailer,
            audit: stores,
            submissions: SubmissionRegistry::default(),
        })
    }

    pub fn in_memory(
        config: AppConfig,
        backend: Arc<InMemoryBackend>,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog: backend.clone(),
            personal_carts: backend.clone(),
            recipe_carts: backend.clone(),
            preconfigured: backend.clone(),
            orders: backend.clone(),
            ledger: backend.clone(),
            mailer,
            audit: backend,
            submissions: SubmissionRegistry::default(),
        }
    }
}

/// Users with an order submission in flight, and order ids whose write outcome is unknown.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRegistry {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    unconfirmed: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl SubmissionRegistry {
    /// Fails with `Conflict` while the same user already holds a permit.
    pub fn acquire(&self, user_id: Uuid) -> Result<SubmissionPermit, AppError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(user_id) {
            return Err(AppError::Conflict(
                "an order submission is already in progress".into(),
            ));
        }
        Ok(SubmissionPermit {
            registry: self.in_flight.clone(),
            user_id,
        })
    }

    /// Order id of the user's last submission that timed out before the store answered.
    pub fn unconfirmed_order(&self, user_id: Uuid) -> Option<Uuid> {
        self.unconfirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .copied()
    }

    pub fn remember_unconfirmed(&self, user_id: Uuid, order_id: Uuid) {
        self.unconfirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, order_id);
    }

    pub fn forget_unconfirmed(&self, user_id: Uuid) {
        self.unconfirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id);
    }

    pub fn is_submitting(&self, user_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user_id)
    }
}

#[derive(Debug)]
pub struct SubmissionPermit {
    registry: Arc<Mutex<HashSet<Uuid>>>,
    user_id: Uuid,
}

impl Drop for SubmissionPermit {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}
