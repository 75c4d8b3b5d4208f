use crate::coords::Point3;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration: cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration: volume size {0} must be positive along every axis")]
    ZeroVolume(Point3),

    #[error("Configuration: block size {0} must be positive along every axis")]
    ZeroBlockSize(Point3),

    #[error("Configuration: core size {0} must be positive along every axis")]
    ZeroCoreSize(Point3),

    #[error("Configuration: core padding must be at least one block")]
    ZeroCorePadding,

    #[error("Configuration: max rounds must be at least one")]
    ZeroRounds,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
