//! Error types for the routing engine

use thiserror::Error;

use crate::model::CarrierId;

/// Errors produced while routing a request
#[derive(Error, Debug, Clone)]
pub enum LcrError {
    #[error("Unparseable number '{input}': {reason}")]
    InputUnparseable { input: String, reason: String },

    #[error("No route found for {0}")]
    NoRouteFound(String),

    #[error("Method {method} not supported on platform {platform}")]
    UnsupportedMethod { method: String, platform: String },

    #[error("Cache load failed for {cache}: {reason}")]
    CacheLoadFailure { cache: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LcrError {
    pub fn unparseable(input: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LcrError::InputUnparseable {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a [`RouteStore`](crate::storage::RouteStore) query
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Carrier {0} not found or inactive")]
    CarrierNotFound(CarrierId),
}

pub type Result<T> = std::result::Result<T, LcrError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
