//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::auth::SessionResponse;
use crate::web::session_cache::SessionCache;
use chrono::Duration as ChronoDuration;
use schoolhub_core::{
    Accounts, BoundedStore, Clock, Coursework, EnrollmentService, EntityStore, GradeBook,
    GroupDirectory, MaterialLibrary, RosterAggregator,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Every service talks to the store through the same `BoundedStore`, so all of
/// them share the configured per-call timeout.
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub session_cache: Arc<SessionCache<SessionResponse>>,
    pub accounts: Accounts,
    pub directory: GroupDirectory,
    pub enrollments: EnrollmentService,
    pub roster: RosterAggregator,
    pub grades: GradeBook,
    pub coursework: Coursework,
    pub materials: MaterialLibrary,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
        session_cache: Arc<SessionCache<SessionResponse>>,
    ) -> Self {
        let store = BoundedStore::new(store, config.store_call_timeout);
        let accounts = Accounts::new(store.clone(), clock.clone())
            .with_admin_email(config.admin_email.clone())
            .with_session_ttl(ChronoDuration::days(config.session_ttl_days));

        Self {
            accounts,
            directory: GroupDirectory::new(store.clone(), clock.clone()),
            enrollments: EnrollmentService::new(store.clone(), clock.clone()),
            roster: RosterAggregator::new(store.clone()),
            grades: GradeBook::new(store.clone()),
            coursework: Coursework::new(store.clone(), clock.clone()),
            materials: MaterialLibrary::new(store, clock.clone()),
            config,
            clock,
            session_cache,
        }
    }
}
