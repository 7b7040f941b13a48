//! Pool configuration: types, TOML loading, env overrides, and validation.
//!
//! Split into focused submodules:
//! - `types`: [`PoolConfig`] and [`QueueLimit`] with serde defaults
//! - `loading`: TOML/file parsing and `POOLSIDE_*` environment overrides
//! - `validation`: structural checks run after every load

mod loading;
mod types;
mod validation;


pub use types::{PoolConfig, QueueLimit};
