//! Secret store access.
//!
//! # Data Flow
//! ```text
//! vault.endpoint set?
//!     no  → SecretResolver is a pass-through over local configuration
//!     yes → HttpSecretStore (bounded connect timeout, bearer token)
//!             → SecretStoreSource: every listed secret, highest precedence layer
//!             → SecretResolver: on-demand lookups for keys absent locally,
//!               cached for the life of the process
//! ```
//!
//! # Design Decisions
//! - Snapshot semantics: a resolved secret never changes during a run
//! - SecretRef indirection is exactly one level deep

pub mod http;
pub mod memory;
pub mod resolver;
pub mod source;
pub mod store;

pub use http::HttpSecretStore;
pub use memory::MemorySecretStore;
pub use resolver::SecretResolver;
pub use source::SecretStoreSource;
pub use store::{SecretError, SecretStore};
