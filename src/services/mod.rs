//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers stay
//! focused on extraction, auth, and response shaping. Each service defines
//! its own error enum implementing [`crate::error::ErrorCode`].

pub mod analytics;
pub mod auth;
pub mod export;
pub mod housekeeping;
pub mod journal;
pub mod metrics;
pub mod reconcile;
pub mod request;
pub mod session;
pub mod student;
pub mod team;
