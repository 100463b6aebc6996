pub mod data;
pub mod io;
pub mod printing;

pub use data::{Config, ConfigKey};
pub use io::ConfigError;
