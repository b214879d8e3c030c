//! Microphone to frame path.
use std::sync::{Arc, OnceLock};

use log::debug;
use serde::{Deserialize, Serialize};
use talkie_core::kernel::context::AppContext;
use talkie_core::plugin_system::feature::{Feature, FeatureKey, FeatureSlot, FeatureWrapper};
use talkie_core::plugin_system::traits::{Plugin, PluginError};
use talkie_core::storage::config::ConfigData;

pub const PLUGIN_NAME: &str = "audio";

/// Sample rates the voice codec accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 3] = [8_000, 16_000, 48_000];

/// Turns captured PCM into frames ready for a transport.
pub trait AudioRoute: Send + Sync {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u8;
    /// Samples per frame, all channels included.
    fn frame_samples(&self) -> usize;
    fn encode(&self, pcm: &[i16]) -> Vec<u8>;
}

impl Feature for dyn AudioRoute {
    const KEY: FeatureKey = FeatureKey::new("talkie.audio-route");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_ms: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl AudioSettings {
    pub fn from_config(config: &ConfigData) -> Result<Self, PluginError> {
        let defaults = Self::default();
        let read = |e: talkie_core::storage::error::StorageError| PluginError::InitError(e.to_string());
        Ok(Self {
            sample_rate: config.try_get("sample_rate").map_err(read)?.unwrap_or(defaults.sample_rate),
            channels: config.try_get("channels").map_err(read)?.unwrap_or(defaults.channels),
            frame_ms: config.try_get("frame_ms").map_err(read)?.unwrap_or(defaults.frame_ms),
        })
    }

    pub fn validate(&self) -> Result<(), PluginError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(PluginError::InitError(format!(
                "Unsupported sample rate {} Hz",
                self.sample_rate
            )));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(PluginError::InitError(format!("Unsupported channel count {}", self.channels)));
        }
        if self.frame_ms == 0 || self.frame_ms > 120 {
            return Err(PluginError::InitError(format!("Unsupported frame length {} ms", self.frame_ms)));
        }
        Ok(())
    }
}

/// Raw little-endian PCM framing.
pub struct PcmRoute {
    settings: AudioSettings,
}

impl PcmRoute {
    pub fn new(settings: AudioSettings) -> Self {
        Self { settings }
    }
}

impl AudioRoute for PcmRoute {
    fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    fn channels(&self) -> u8 {
        self.settings.channels
    }

    fn frame_samples(&self) -> usize {
        (self.settings.sample_rate as usize * self.settings.frame_ms as usize / 1000) * self.settings.channels as usize
    }

    fn encode(&self, pcm: &[i16]) -> Vec<u8> {
        pcm.iter().flat_map(|sample| sample.to_le_bytes()).collect()
    }
}

/// Publishes an [`AudioRoute`] built from the plugin's settings in `initialize`.
#[derive(Default)]
pub struct AudioPlugin {
    config: OnceLock<ConfigData>,
    route: FeatureSlot<dyn AudioRoute>,
}

impl AudioPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> Result<AudioSettings, PluginError> {
        match self.config.get() {
            Some(config) => AudioSettings::from_config(config),
            None => Ok(AudioSettings::default()),
        }
    }
}

impl Plugin for AudioPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn attach_context(&self, context: Arc<AppContext>) {
        let _ = self.config.set(context.plugin_config(PLUGIN_NAME));
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        vec![FeatureWrapper::new(self.route.provider())]
    }

    fn customization_options(&self) -> ConfigData {
        let settings = self.settings().unwrap_or_default();
        let mut options = ConfigData::new();
        let _ = options.set("sample_rate", settings.sample_rate);
        let _ = options.set("channels", settings.channels);
        let _ = options.set("frame_ms", settings.frame_ms);
        options
    }

    fn initialize(&self) -> Result<(), PluginError> {
        if self.route.is_filled() {
            return Ok(());
        }
        let settings = self.settings()?;
        settings.validate()?;
        self.route.fill(Arc::new(PcmRoute::new(settings)));
        debug!(
            "Audio route ready: {} Hz, {} channel(s), {} ms frames",
            settings.sample_rate, settings.channels, settings.frame_ms
        );
        Ok(())
    }
}
