pub mod config;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::{
    ConfigError, NotificationStrings, NotifierBackend, UpdaterConfig, CONFIG_FILE_NAME,
};
pub use state::{
    CheckState, FileStateStore, MemoryStateStore, StateError, StateStore, STATE_FILE_NAME,
};
pub use utils::{all_dir, get_data_path, DataDir};
