//! Convoy Gateway Library
//!
//! This crate provides the HTTP ingress of the pipeline: authentication,
//! multipart upload admission and the login proxy.

pub mod auth;
pub mod error;
mod handlers;
pub mod services;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
