//! Helpers for tests that need a real database. Enabled by the `test_utils` feature.
pub mod fake_gateway;
pub mod prepare_env;
pub mod seed;
