//! HTTP surface of the hospital backend
//!
//! Handlers stay thin: extract, call one service method, shape the response.

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::db::Database;
use crate::services::{
    BillingLedger, Dashboard, IdentityDirectory, PrescriptionLedger, ProfileDirectory,
    SchedulingLedger, StatsCache,
};

pub use routes::configure;

/// Shared application state, one per server.
#[derive(Clone)]
pub struct AppState {
    pub directory: IdentityDirectory,
    pub profiles: ProfileDirectory,
    pub scheduling: SchedulingLedger,
    pub billing: BillingLedger,
    pub prescriptions: PrescriptionLedger,
    pub dashboard: Dashboard,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(db: &Database, tokens: TokenIssuer, stats: Arc<StatsCache>) -> Self {
        let pool = db.pool().clone();
        Self {
            directory: IdentityDirectory::new(pool.clone()),
            profiles: ProfileDirectory::new(pool.clone()),
            scheduling: SchedulingLedger::new(pool.clone()),
            billing: BillingLedger::new(pool.clone()),
            prescriptions: PrescriptionLedger::new(pool.clone()),
            dashboard: Dashboard::new(pool, stats),
            tokens,
        }
    }
}
