//! The typed error surface every public entry point in this crate returns.
//! Internal helper crates (`netconf-ipnet`, `netconf-alloc`, `netconf-store`)
//! stay on `anyhow::Result`; this is where those get narrowed.

use netconf_alloc::AllocError;
use netconf_store::DiskStoreError;

#[derive(thiserror::Error, Debug)]
pub enum AdaptorError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InUse(String),

    #[error("{0}")]
    Exhausted(String),

    #[error("{0}")]
    ParseError(String),

    #[error("{message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    PluginError {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl AdaptorError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn plugin_error(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::PluginError {
            message: message.into(),
            source,
        }
    }
}

impl From<AllocError> for AdaptorError {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::Exhausted(_) => Self::Exhausted(e.to_string()),
            AllocError::NoSubnet => Self::Exhausted(e.to_string()),
            AllocError::NoGateway(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DiskStoreError> for AdaptorError {
    fn from(e: DiskStoreError) -> Self {
        match e {
            DiskStoreError::Exists(name) => {
                Self::InvalidArgument(format!("network config file for {:?} already exists", name))
            }
            DiskStoreError::TooMany(dir, max) => Self::Internal(format!(
                "too many network config files in {:?} (max {})",
                dir, max
            )),
            DiskStoreError::Io(source) => Self::IoError {
                message: source.to_string(),
                source,
            },
            DiskStoreError::Json(e) => Self::Internal(e.to_string()),
        }
    }
}
