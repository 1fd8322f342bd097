//! Integration test suite for the resolution core.
//!
//! End-to-end scenarios running the full pipeline: filter parsing, entry
//! matching, placeholder substitution, subscription creation, and content
//! selection, against in-memory stores.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! Tests are organized by functionality area:
//! - **deployment_flow**: Happy-path resolution through content selection
//! - **error_scenarios**: Content-error propagation and verbatim messages

mod deployment_flow;
mod error_scenarios;

mod support {
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Install a test-writer subscriber honoring `RUST_LOG`, once per
    /// process.
    pub fn init_tracing() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .init();
        });
    }
}
