//! Convoy Worker Library
//!
//! This crate provides the conversion worker: it drains the upload topic,
//! converts each source blob to MP3 and publishes one result per task.

pub mod converter;
pub mod state;
pub mod worker;

pub use converter::{ConversionError, ConvertedArtifact, Converter, FfmpegConverter};
pub use state::{RunSummary, TaskState};
pub use worker::{ConversionWorker, StageError};
