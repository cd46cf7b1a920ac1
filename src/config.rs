//! Read-only configuration handed to provider instances.
//!
//! - [`ClientConfig`] drives the fetch primitive (timeout, user agent, static headers).
//! - [`ProviderParams`] is the untyped per-instance mapping; providers convert it once, at
//!   construction, into their own typed struct.
//! - [`ErrorMessages`] maps error keys to message templates used when providers describe failures.

pub mod client;
pub mod messages;
pub mod params;

pub use client::*;
pub use messages::*;
pub use params::*;
