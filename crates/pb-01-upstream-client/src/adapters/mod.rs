//! Adapters: reqwest-backed upstream client and its collaborators.

pub mod authenticator;
pub mod connection_gate;
pub mod credentials;
pub mod http_client;
