//! Domain services. Each owns a pool handle and enforces its own
//! permission and invariant checks before touching the store.

pub mod billing;
pub mod dashboard;
pub mod directory;
pub mod prescriptions;
pub mod profiles;
pub mod scheduling;
pub mod visibility;

pub use billing::BillingLedger;
pub use dashboard::{Clock, Dashboard, DashboardStats, StatsCache, SystemClock};
pub use directory::{IdentityDirectory, Registration};
pub use prescriptions::PrescriptionLedger;
pub use profiles::ProfileDirectory;
pub use scheduling::SchedulingLedger;
pub use visibility::Scope;
