//! GitHub backend for tubular.
//!
//! [`GitHubClient`] implements [`tubular_core::SourceControlClient`] over the
//! GitHub REST API for a single repository.

pub mod client;
pub mod config;

pub use client::GitHubClient;
pub use config::GitHubConfig;
