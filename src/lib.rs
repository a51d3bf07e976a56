//! HTTP inference service for crop recommendation and soil fertility models.
//!
//! Requests pass through the field reconciler ([`reconcile`]), are scaled and
//! classified by the shared [`engine::InferenceContext`], and come back as
//! labeled predictions ([`routes`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod routes;
pub mod types;

pub use config::Config;
pub use engine::InferenceContext;
pub use error::ApiError;
