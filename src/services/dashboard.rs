//! Admin dashboard aggregate, cached for a bounded time under a fixed key.
//!
//! Whichever request finds the entry missing or expired recomputes it.
//! Simultaneous recomputation is harmless: the aggregate is read-only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};

use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::{AppointmentStatus, Money, PaymentStatus, Role};

pub const DASHBOARD_CACHE_KEY: &str = "dashboard_stats";
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(300);

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_doctors: i64,
    pub total_patients: i64,
    pub total_appointments: i64,
    pub pending_appointments: i64,
    pub completed_appointments: i64,
    pub total_revenue: Money,
    pub monthly_appointments: i64,
}

/// Time-bounded JSON cache. Entries older than the TTL are treated as absent.
pub struct StatsCache {
    entries: DashMap<String, (serde_json::Value, DateTime<Utc>)>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl StatsCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        let (value, stored_at) = entry.value();
        let age = self.clock.now().signed_duration_since(*stored_at);
        match age.to_std() {
            Ok(age) if age >= self.ttl => None,
            // A stored_at in the future (clock skew) still counts as fresh.
            _ => Some(value.clone()),
        }
    }

    pub fn insert(&self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), (value, self.clock.now()));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[derive(Clone)]
pub struct Dashboard {
    pool: SqlitePool,
    cache: Arc<StatsCache>,
}

impl Dashboard {
    pub fn new(pool: SqlitePool, cache: Arc<StatsCache>) -> Self {
        Self { pool, cache }
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn stats(&self, caller: &Caller) -> AppResult<DashboardStats> {
        caller.require_admin()?;

        if let Some(cached) = self.cache.get(DASHBOARD_CACHE_KEY) {
            match serde_json::from_value(cached) {
                Ok(stats) => {
                    debug!("Dashboard cache hit");
                    return Ok(stats);
                }
                Err(e) => warn!(error = %e, "Discarding unreadable dashboard cache entry"),
            }
        }

        debug!("Dashboard cache miss");
        let stats = self.compute().await?;
        let value = serde_json::to_value(&stats).map_err(|e| AppError::Internal(e.to_string()))?;
        self.cache.insert(DASHBOARD_CACHE_KEY, value);
        Ok(stats)
    }

    async fn compute(&self) -> AppResult<DashboardStats> {
        let (month_start, next_month) = month_bounds(self.cache.now().date_naive());

        let total_doctors = self.count_identities(Role::Doctor).await?;
        let total_patients = self.count_identities(Role::Patient).await?;
        let total_appointments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
            .fetch_one(&self.pool)
            .await?;
        let pending_appointments = self.count_appointments(AppointmentStatus::Pending).await?;
        let completed_appointments = self.count_appointments(AppointmentStatus::Completed).await?;
        let monthly_appointments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE appointment_date >= ? AND appointment_date < ?",
        )
        .bind(month_start)
        .bind(next_month)
        .fetch_one(&self.pool)
        .await?;

        // Summed here rather than in SQL so decimals stay exact.
        let paid: Vec<Money> =
            sqlx::query_scalar("SELECT total_amount FROM invoices WHERE payment_status = ?")
                .bind(PaymentStatus::Paid)
                .fetch_all(&self.pool)
                .await?;
        let total_revenue = Money::checked_sum(paid)
            .ok_or_else(|| AppError::Internal("paid invoice revenue overflowed".into()))?;

        info!(total_appointments, %total_revenue, "Dashboard stats computed");
        Ok(DashboardStats {
            total_doctors,
            total_patients,
            total_appointments,
            pending_appointments,
            completed_appointments,
            total_revenue,
            monthly_appointments,
        })
    }

    async fn count_identities(&self, role: Role) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE role = ?")
            .bind(role)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_appointments(&self, status: AppointmentStatus) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE status = ?")
            .bind(status)
            .fetch_one(&self.pool)
            .await?)
    }
}

/// First day of the month containing `day`, and first day of the next.
fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    (start, next.unwrap_or(NaiveDate::MAX))
}
