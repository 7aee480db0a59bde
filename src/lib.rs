//! Core authentication and token subsystem for a multi-tenant identity
//! provider.
//!
//! This crate implements credential verification (including legacy hash
//! formats), JWT access/refresh token issuance with rotation and reuse
//! detection, the account lockout policy, reversible encryption for at-rest
//! secrets, and the pluggable legacy-database credential bridge. The HTTP
//! layer, persistence engines, and email delivery are external collaborators;
//! persistence is reached through the [`store::AuthStore`] trait.

pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::AuthConfig;
pub use services::{AuthService, ServiceError, TokenService};
pub use store::{AuthStore, MemoryStore};
