//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random tokens, SHA-256, constant-time compare)
//! - Password hashing (Argon2id)
//! - Cookie and bearer token extraction
//! - Client identification (IP, User-Agent)

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod password;
