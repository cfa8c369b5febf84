//! Infrastructure Layer
//!
//! Reference implementations of the provider ports.

pub mod access;
pub mod memory;

pub use access::StaticAccessResolver;
pub use memory::{MemoryIdentityProvider, MemoryProviderConfig, ResetMail};
