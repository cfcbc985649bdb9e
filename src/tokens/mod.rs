//! # Token Minting and Verification
//!
//! [`factory`] assembles and signs custom tokens that a Firebase client SDK
//! exchanges for an ID token. [`verifier`] validates Firebase-issued ID
//! tokens and session cookies against the backend's rotating public keys.

pub mod factory;
pub mod verifier;

pub use factory::TokenFactory;
pub use verifier::{FirebaseToken, TokenKind, TokenVerifier};
