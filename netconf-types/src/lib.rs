pub mod conflist;
pub mod constants;
pub mod error;
pub mod exec;
pub mod logger;
