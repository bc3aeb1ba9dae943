//! # zstack-core
//!
//! Session and async-job plumbing for the ZStack management API.
//!
//! A [`Session`] logs in with an account name and password, signs every request
//! with the session token, and hands `202 Accepted` responses to an
//! [`AsyncHandle`], which polls the returned location until the job finishes.
//!
//! ## Modules
//!
//! - [`error`] - Error types and server error chain flattening
//! - [`uuid`] - Strongly-typed UUID wrappers for ZStack resources
//! - [`types`] - Wire types shared by the session and resource clients
//! - [`config`] - Endpoint, TLS and timing configuration
//! - [`client`] - HTTP transport construction
//! - [`session`] - Login, logout and the authenticated request envelope
//! - [`poller`] - Async job polling

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod session;
pub mod types;
pub mod uuid;

// Re-export commonly used types
pub use config::ZStackConfig;
pub use error::{ApiError, Error, PollError, Result};
pub use poller::{AsyncHandle, PollState};
pub use session::Session;
