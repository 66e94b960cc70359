//! Configuration loading and shared configuration types.
//!
//! [`load::load_config`] layers `configuration/base.*`, `configuration/<environment>.*` and
//! `APP_`-prefixed environment variables. The [`shared`] module holds the configuration types of
//! the coordination primitives together with their validation rules.

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
