//! Vantage API - domain endpoints of the monitoring dashboard
//!
//! Thin typed wrappers over the `vantage-core` request pipeline: auth,
//! monitor-source configuration, metrics queries, anomaly/AI analysis,
//! rule CRUD, notification queries and system information. All resilience
//! behavior (retry, circuit breaking, caching, error routing) comes from
//! the core layer; this crate only binds parameters to paths.

pub mod service;
pub mod types;

pub use service::ApiService;
pub use types::{LoginRequest, LoginResponse, Rule};
