// src/config/mod.rs

//! Configuration: the typed `ConfigFile` and the dotted-path `ConfigStore`
//! it is read from.

pub mod loader;
pub mod model;
pub mod store;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, open_store};
pub use model::{BundlerSection, ConfigFile, PluginsSection, RawConfigFile, WatchSection};
pub use store::{json_to_toml, ConfigStore};
