pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{CampusConfig, ConfigError, ConfigProperties, ConfigValue, FromConfigValue, PropertyMeta};
pub use error::ServiceError;
pub use telemetry::{init_tracing, init_tracing_with, DEFAULT_FILTER};

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{
        init_tracing, CampusConfig, ConfigError, ConfigProperties, ServiceError,
    };
}
