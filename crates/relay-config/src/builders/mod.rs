//! Test configuration builders.

mod config;

pub use config::{ConfigBuilder, TEST_PRIVATE_KEY};
