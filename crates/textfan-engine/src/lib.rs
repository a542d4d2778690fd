#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
mod dispatch;
pub mod service;
pub mod store;

pub use client::{CompletionBackend, CompletionConnector, HttpCompletionClient, HttpConnector};
pub use config::EngineConfig;
pub use service::{JobRequest, TextService};
pub use store::JobStore;
pub use textfan_core::{Error, HealthReport, JobSnapshot, JobStatus, Result, chunker};
