//! Ports: the driving `UpstreamApi` and the driven `CredentialProvider`.

pub mod inbound;
pub mod outbound;
