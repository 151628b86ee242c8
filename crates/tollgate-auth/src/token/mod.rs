//! Token lifecycle after issuance.
//!
//! - [`revocation`] - single and bulk grant deletion
//! - [`reaper`] - periodic deletion of expired authorization codes
//! - [`introspection`] - access token lookup for resource servers
//! - [`pat`] - personal access tokens
//! - [`system_apps`] - first-party applications and their direct tokens

pub mod introspection;
pub mod pat;
pub mod reaper;
pub mod revocation;
pub mod system_apps;

pub use introspection::{TokenInfo, TokenLookup};
pub use pat::PatService;
pub use reaper::ExpiredCodeReaper;
pub use revocation::RevocationService;
pub use system_apps::{IssuedToken, SystemApp, SystemAppRegistry, SystemTokenService};
