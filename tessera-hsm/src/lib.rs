//! Tessera HSM Provider
//!
//! Key custody behind an opaque-handle boundary. Two implementations:
//!
//! - [`DevHsmProvider`]: in-memory secure storage with HKDF-SHA-512
//!   derivation, for Tier-1 development deployments
//! - [`FipsHsmProvider`]: a FIPS 140-3 module client, compiled in full
//!   only with the `fips` feature (a fail-closed stub otherwise)
//!
//! The provider is selected per tenant at context construction; nothing
//! downstream branches on which implementation is behind the trait.

pub mod dev;
pub mod error;
pub mod fips;
pub mod provider;

pub use dev::DevHsmProvider;
pub use error::{HsmError, HsmResult};
pub use fips::{FipsConfig, FipsHsmProvider};
pub use provider::{HolderShare, HsmProvider, KeyMaterial};
