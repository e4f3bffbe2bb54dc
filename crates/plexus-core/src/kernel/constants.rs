/// Application name
pub const APP_NAME: &str = "Plexus";

/// Core library version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between two delayed initializations that asked for one, in milliseconds
pub const DELAYED_INITIALIZE_INTERVAL_MS: u64 = 20;

/// Name reported to platform specifications when none is configured
pub fn host_platform_name() -> String {
    format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH)
}
