pub mod builder;
pub mod error;
pub mod registry;
pub mod types;

pub use builder::{CreateRequest, Driver};
pub use error::AdaptorError;
pub use registry::NativeStore;
pub use types::{ApiConf, ApiResult, CreateResponse, Extra, ListFilter, NetworkSummary, RemoveResponse};
