//! # Payment Bridge Test Suite
//!
//! Cross-crate flows: a wiremock upstream behind the real HTTP client, the RPC
//! bridge over the in-memory broker, and the HTTP gateway on top.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # Upstream mock, bridge and broker setup
//!     ├── bridge_flows.rs  # Bus request → upstream → reply
//!     └── http_flows.rs    # HTTP request → coordinator → upstream
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pb-tests
//! cargo test -p pb-tests integration::bridge_flows::
//! ```

pub mod integration;
