//! Storage traits for applications and grants.
//!
//! # Implementations
//!
//! - [`memory::MemoryStorage`] - in-process, for tests and single-node
//!   development
//! - `tollgate-auth-postgres` - PostgreSQL storage backend

pub mod application;
pub mod grant;
pub mod memory;

pub use application::ApplicationRegistry;
pub use grant::{PendingGrantLock, TokenStore};
pub use memory::MemoryStorage;
