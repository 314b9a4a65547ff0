//! # Hosts Redirect Library
//!
//! This crate overrides name resolution for a fixed set of hostnames. A
//! hosts file, chosen by the active storage profile, is parsed into a
//! redirection table that resolution requests consult before falling back
//! to regular DNS.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types and handling
//! - [`logging`]: Logging setup and configuration
//! - [`parser`]: The byte-level hosts-file state machine
//! - [`redirector`]: Loading, reloading and querying redirections
//! - [`selector`]: Hosts file selection per storage profile
//! - [`store`]: The concurrent redirection table
//!
//! ## Example
//!
//! ```ignore
//! use hosts_redirect::{AppConfig, HostRedirector};
//!
//! let config = AppConfig::load("hosts-redirect.yaml")?;
//! let redirector = HostRedirector::from_config(&config);
//! redirector.initialize_redirections(config.redirect.add_defaults)?;
//!
//! if let Some(addr) = redirector.try_get_redirection("receive-lp1.dg.srv.nintendo.net") {
//!     println!("redirected to {}", addr);
//! }
//! ```
//!
//! ## Hosts File Format
//!
//! One record per line: an IPv4 address, whitespace, then one or more
//! hostnames separated by spaces or tabs. Lines that do not start with a
//! digit (comments, blank lines) are ignored, as are malformed records.

pub mod config;
pub mod error;
pub mod logging;
pub mod parser;
pub mod redirector;
pub mod selector;
pub mod store;

pub use config::{AppConfig, ConfigManager};
pub use error::{RedirectError, Result};
pub use parser::{parse_hosts, HostEntry, HostsParser, ParseIssue, ParseOutcome};
pub use redirector::HostRedirector;
pub use selector::{HostsFileSelector, StorageProfile};
pub use store::{RedirectionStore, DEFAULT_HOSTS_FILE};
