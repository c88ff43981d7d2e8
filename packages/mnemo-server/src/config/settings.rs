//! `Settings` -- the `./config.json` schema (§6). Modeled after the
//! teacher's `ServerConfig`: a single struct covering every configurable
//! knob, loaded with `serde_json`, defaults written back when the file is
//! missing or fails to parse.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WssConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WssConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4286,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenLlmConfig {
    pub base_url: String,
    pub model: String,
    pub temp: f64,
    pub max_completion_tokens: u32,
}

impl Default for OpenLlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temp: 0.2,
            max_completion_tokens: 1024,
        }
    }
}

/// STM sizing, consumed by [`crate::store::EvictingStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShortVdbConfig {
    pub progressive_eviction: bool,
    pub max_size_before_evict: i64,
}

impl Default for ShortVdbConfig {
    fn default() -> Self {
        Self {
            progressive_eviction: true,
            max_size_before_evict: 200,
        }
    }
}

/// LTM sizing, consumed by [`crate::store::DecayingStore`] and the
/// [`crate::compressor::Compressor`]'s lifetime computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LongVdbConfig {
    pub max_size: i64,
    pub max_memory_lifetime: i64,
}

impl Default for LongVdbConfig {
    fn default() -> Self {
        Self {
            max_size: 5000,
            max_memory_lifetime: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserDbConfig {
    pub max_size_per_user: usize,
}

impl Default for UserDbConfig {
    fn default() -> Self {
        Self {
            max_size_per_user: 500,
        }
    }
}

/// Compression/eviction-batch tuning. `batch_fraction_on_breach` and
/// `min_batch_on_breach` are the on-wire names for the `EvictingStore`
/// contract's `evict_fraction` and `evict_min_batch` (§4.2); they live here
/// because they only matter once a batch is headed for compression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub score_floor_for_ltm: f64,
    pub batch_size: usize,
    pub similar_top_k: usize,
    pub prefer_new: bool,
    pub batch_fraction_on_breach: f64,
    pub min_batch_on_breach: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            score_floor_for_ltm: 0.3,
            batch_size: 20,
            similar_top_k: 3,
            prefer_new: false,
            batch_fraction_on_breach: 0.5,
            min_batch_on_breach: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub wss: WssConfig,
    pub openllm: OpenLlmConfig,
    pub short_vdb: ShortVdbConfig,
    pub long_vdb: LongVdbConfig,
    pub user_db: UserDbConfig,
    pub compression: CompressionConfig,
}

impl Settings {
    /// Loads settings from `path`. A missing or unparseable file is treated
    /// as "use defaults, then write them back" so the file is self-
    /// documenting on first run.
    pub fn load_or_init(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => Ok(settings),
                Err(err) => {
                    warn!(%err, path = %path.display(), "config.json invalid, writing defaults");
                    let settings = Settings::default();
                    settings.write(path)?;
                    Ok(settings)
                }
            },
            Err(_) => {
                let settings = Settings::default();
                settings.write(path)?;
                Ok(settings)
            }
        }
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
