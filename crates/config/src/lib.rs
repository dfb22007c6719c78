//! Configuration loading for botline.
//!
//! Schema types live in [`schema`]; [`loader`] discovers and parses config
//! files (TOML/YAML/JSON) with `${ENV_VAR}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, find_or_default_config_path, load_config},
    schema::BotlineConfig,
};
