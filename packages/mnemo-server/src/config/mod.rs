//! Startup plumbing: `./config.json` settings and `./.env` secrets.

mod env;
mod settings;

pub use env::EnvFile;
pub use settings::{
    CompressionConfig, LongVdbConfig, OpenLlmConfig, ShortVdbConfig, Settings, UserDbConfig,
    WssConfig,
};
