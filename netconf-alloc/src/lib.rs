pub mod allocate;
pub mod conflict;
pub mod host;
pub mod plugin_probe;

pub use allocate::AllocError;
pub use conflict::Availability;
