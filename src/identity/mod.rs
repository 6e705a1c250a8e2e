//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! X-API-Key header
//!     → resolver.rs (cache-aside against the shared store)
//!     → source.rs (relational source of truth, on miss only)
//!     → Identity { user_id, tier }
//! ```

pub mod resolver;
pub mod source;
pub mod types;

pub use resolver::IdentityResolver;
pub use source::{IdentitySource, PgIdentitySource, StaticIdentitySource};
pub use types::{Identity, IdentityRecord, SourceError, Tier};
