//! Configuration for the streaming client.
//!
//! This module provides:
//!
//! - [`ClientConfig`] and [`ClientConfigBuilder`] for configuring the client
//! - [`Scheme`] selection following the embedding page's transport security
//! - Type-safe values: [`Query`], [`Credential`], and [`SessionId`]
//!
//! # Example
//!
//! ```ignore
//! use agentstream::config::{ClientConfig, Credential};
//!
//! // Defaults: ws://localhost:8000/ws/process-query
//! let config = ClientConfig::builder().build()?;
//!
//! // Overrides from AGENT_STREAM_HOST / AGENT_STREAM_PATH / AGENT_STREAM_SECURE
//! let config = agentstream::config::ClientConfigBuilder::from_env()?.build()?;
//!
//! // Token from AGENT_STREAM_TOKEN
//! let credential = Credential::from_env();
//! ```

pub mod builder;
pub mod options;

pub use builder::{
    ClientConfig, ClientConfigBuilder, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT, DEFAULT_PATH, ENV_HOST, ENV_PATH, ENV_SECURE,
};
pub use options::{Credential, Query, Scheme, SessionId, ENV_TOKEN};
