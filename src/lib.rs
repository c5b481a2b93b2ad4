//! Contentfaux
//!
//! A local test-double for a Contentful-style content API. It pulls one
//! sample entry per content type into a fixture directory, then answers
//! outbound requests from those fixtures instead of the network.
//!
//! # Features
//!
//! - **Fixture Sync**: Discover content types and save one sample each
//! - **Request Stubbing**: Serve fixtures for any intercepted request
//! - **Padding**: Repeat the first item until `limit` items are returned
//! - **Hooks**: Intercept in-process calls or serve them on a loopback port
//!
//! # Example Configuration
//!
//! ```yaml
//! # contentfaux.yaml
//! space_id: abc123
//! api_key: delivery-token
//! fixture_dir: test/contentfaux
//! preview: false
//! listen: 127.0.0.1:4010
//! ```
//!
//! Environment variables (`CONTENTFAUX_SPACEID`, `CONTENTFAUX_APIKEY`,
//! `CONTENTFAUX_DIR`, ...) take precedence over the file.

pub mod config;
pub mod controller;
pub mod error;
pub mod fixtures;
pub mod interceptor;
pub mod loopback;
pub mod query;
pub mod remote;
pub mod sync;
pub mod transport;

pub use config::{Command, Settings, SettingsLayer};
pub use controller::{Controller, RunOutcome};
pub use error::{FauxError, Result};
pub use interceptor::Interceptor;
pub use loopback::LoopbackHook;
pub use remote::{ApiEndpoint, ContentSource, HttpSource, RemoteFetcher};
pub use sync::{SyncConfig, Synchronizer};
pub use transport::{ProcessHook, TransportHook};
