//! Integration flows across the upstream client, bridge and gateway.

#[cfg(test)]
mod fixtures;

pub mod bridge_flows;
pub mod http_flows;
