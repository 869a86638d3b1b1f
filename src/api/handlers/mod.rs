//! Request handlers, one module per resource.

pub mod appointments;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod doctors;
pub mod patients;
pub mod prescriptions;
