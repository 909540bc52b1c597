//! Secret handling for onboarding.
//!
//! [`SecretStore`] seals gateway secrets and provider credentials at rest.
//! [`tokens`] generates gateway bearer tokens and normalizes pasted secrets.

pub mod secrets;
pub mod tokens;

pub use secrets::SecretStore;
pub use tokens::{generate_gateway_token, normalize_api_key_input, normalize_token_input};
