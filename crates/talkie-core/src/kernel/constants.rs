/// Application name
pub const APP_NAME: &str = "Talkie";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File stem of the application configuration (`talkie.json`, `talkie.toml`, ...)
pub const APP_CONFIG_STEM: &str = "talkie";

/// Directory below the config root holding per-plugin configuration
pub const PLUGIN_CONFIG_DIR: &str = "plugins";

/// Application config section read into `ManagerSettings`
pub const MANAGER_SETTINGS_KEY: &str = "plugin_manager";

/// Name of the worker thread running background post-initialization
pub const POST_INIT_THREAD_NAME: &str = "talkie-post-init";
