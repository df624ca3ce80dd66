//! Build-time constants shared by every layer of the adaptor.

/// CNI conflist version written by the builder.
pub const CURRENT_VERSION: &str = "1.0.0";

/// Domain name advertised by the `dnsname` plugin.
pub const ISULAD_DNS_DOMAIN_NAME: &str = "isulad.net";

/// Filename prefix that marks a conflist as owned by this adaptor.
pub const NATIVE_CONFIG_PREFIX: &str = "isulad-network-";

/// File extension used for persisted conflists.
pub const NATIVE_CONFIG_SUFFIX: &str = ".conflist";

/// Directory mode used when the configuration directory does not yet exist.
pub const CONFIG_DIRECTORY_MODE: u32 = 0o755;

/// File mode used for persisted conflist files.
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Refuse to load more than this many conflist files at startup.
pub const MAX_NETWORK_CONFIG_FILE_COUNT: usize = 1000;

/// Upper bound on bridge-name allocation attempts.
pub const MAX_BRIDGE_ID: u32 = 1024;

pub const NETWORK_DRIVER_BRIDGE: &str = "bridge";
pub const NETWORK_DRIVER_MACVLAN: &str = "macvlan";
