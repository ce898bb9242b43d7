//! Outbound adapters implementing domain ports.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of the domain port traits:
//!
//! - **memory**: mutex-guarded in-memory stores, plus JSON seeding
//!
//! Adapters are thin translators that convert between domain types and
//! storage representations. They contain no business logic beyond the
//! store-level guarantees their ports promise.

pub mod memory;
