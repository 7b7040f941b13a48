//! Worker pool -- admission, dispatch, scaling, and shutdown.
//!
//! Split into focused submodules:
//! - `core`: [`Pool`] façade, construction, accessors, drain and destroy
//! - `dispatch`: the admission algorithm and the completion path
//! - `workers`: the worker set (spawn, selection, scale-down, terminate-all)

mod core;
mod dispatch;
mod workers;

pub use self::core::Pool;
