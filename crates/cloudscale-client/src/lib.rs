//! cloudscale REST API Client
//!
//! A Rust client library for the cloudscale compute API.
//! Provides type-safe models and methods for servers, server groups and volumes.
//!
//! # Example
//!
//! ```no_run
//! use cloudscale_client::{CloudscaleClient, CloudscaleClientTrait, TagFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a client
//! let client = CloudscaleClient::new(
//!     "https://api.cloudscale.ch".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Find servers carrying a tag
//! let filter = TagFilter::new("machine-api-provider-cloudscale_appuio_io_name", "app-1");
//! let servers = client.list_servers(Some(&filter)).await?;
//!
//! for server in servers {
//!     println!("{} {}", server.uuid, server.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Servers**: create, get, list by tag, delete
//! - **Server Groups**: create and list anti-affinity groups
//! - **Volumes**: tag updates
//! - **Per-token clients**: [`CloudscaleClientFactory`] builds a client per API token

pub mod client;
#[path = "trait.rs"]
pub mod cloudscale_trait;
pub mod common;
pub mod error;
pub mod factory;
pub mod models;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::CloudscaleClient;
pub use cloudscale_trait::CloudscaleClientTrait;
pub use common::HttpClient;
pub use error::CloudscaleError;
pub use factory::{CloudscaleClientFactory, HttpClientFactory};
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockCloudscaleClient, MockOperation};
