//! Peer-to-peer links a talk session can broadcast on.
//!
//! Radio discovery and pairing live outside this crate; the transports here
//! keep the link bookkeeping the rest of the host relies on.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use talkie_core::kernel::context::AppContext;
use talkie_core::plugin_system::feature::{Feature, FeatureKey, FeatureProvider, FeatureSlot, FeatureWrapper};
use talkie_core::plugin_system::traits::{Plugin, PluginError};
use talkie_core::storage::config::ConfigData;

pub const BLUETOOTH_PLUGIN: &str = "bluetooth";
pub const WIFI_DIRECT_PLUGIN: &str = "wifi-direct";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Bluetooth,
    WifiDirect,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport '{0}' is not connected")]
    NotConnected(String),

    #[error("Frame of {size} bytes exceeds the {limit} byte limit of '{transport}'")]
    FrameTooLarge {
        transport: String,
        size: usize,
        limit: usize,
    },
}

impl From<TransportError> for PluginError {
    fn from(error: TransportError) -> Self {
        PluginError::Other(Box::new(error))
    }
}

/// A link to nearby peers.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> TransportKind;
    /// Largest frame accepted by [`broadcast`](Self::broadcast).
    fn max_frame_size(&self) -> usize;
    /// Sends one frame to every connected peer, returning the bytes written.
    fn broadcast(&self, frame: &[u8]) -> Result<usize, TransportError>;
    fn frames_sent(&self) -> u64;
}

impl Feature for dyn Transport {
    const KEY: FeatureKey = FeatureKey::new("talkie.transport");
}

/// Options shared by both radio plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    pub max_frame_size: usize,
    /// Require the platform radio stack in `do_after_initialize`.
    pub native_stack: bool,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            max_frame_size: 512,
            native_stack: false,
        }
    }
}

impl RadioSettings {
    fn from_config(config: &ConfigData) -> Result<Self, PluginError> {
        let defaults = Self::default();
        let read = |e: talkie_core::storage::error::StorageError| PluginError::InitError(e.to_string());
        Ok(Self {
            max_frame_size: config.try_get("max_frame_size").map_err(read)?.unwrap_or(defaults.max_frame_size),
            native_stack: config.try_get("native_stack").map_err(read)?.unwrap_or(defaults.native_stack),
        })
    }

    fn to_config(&self) -> ConfigData {
        let mut config = ConfigData::new();
        let _ = config.set("max_frame_size", self.max_frame_size);
        let _ = config.set("native_stack", self.native_stack);
        config
    }
}

/// In-process link with frame accounting.
pub struct RadioLink {
    name: String,
    kind: TransportKind,
    max_frame_size: usize,
    connected: AtomicBool,
    frames: AtomicU64,
    last_frame: Mutex<Vec<u8>>,
}

impl RadioLink {
    pub fn new(name: impl Into<String>, kind: TransportKind, max_frame_size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            max_frame_size,
            connected: AtomicBool::new(true),
            frames: AtomicU64::new(0),
            last_frame: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn last_frame(&self) -> Vec<u8> {
        self.last_frame.lock().map(|frame| frame.clone()).unwrap_or_default()
    }
}

impl Transport for RadioLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn broadcast(&self, frame: &[u8]) -> Result<usize, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected(self.name.clone()));
        }
        if frame.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                transport: self.name.clone(),
                size: frame.len(),
                limit: self.max_frame_size,
            });
        }
        if let Ok(mut last) = self.last_frame.lock() {
            last.clear();
            last.extend_from_slice(frame);
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(frame.len())
    }

    fn frames_sent(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

fn settings_for(context: Arc<AppContext>, plugin: &str, cell: &OnceLock<Result<RadioSettings, String>>) {
    let parsed = RadioSettings::from_config(&context.plugin_config(plugin)).map_err(|e| e.to_string());
    let _ = cell.set(parsed);
}

fn read_settings(cell: &OnceLock<Result<RadioSettings, String>>) -> Result<RadioSettings, PluginError> {
    match cell.get() {
        None => Ok(RadioSettings::default()),
        Some(Ok(settings)) => Ok(settings.clone()),
        Some(Err(message)) => Err(PluginError::InitError(message.clone())),
    }
}

fn check_native_stack(plugin: &str, settings: &RadioSettings) -> Result<(), PluginError> {
    if settings.native_stack {
        return Err(PluginError::PlatformLinkage(format!(
            "native {} stack is not linked into this build",
            plugin
        )));
    }
    Ok(())
}

/// Settings and link of the Bluetooth plugin, shared with the provider it publishes.
#[derive(Default)]
struct BluetoothState {
    settings: OnceLock<Result<RadioSettings, String>>,
    link: OnceLock<Arc<RadioLink>>,
}

impl BluetoothState {
    /// Opens the link on first use. Not ready until the context is attached,
    /// so the link always sees the configured settings.
    fn link(&self) -> Result<Arc<RadioLink>, PluginError> {
        if let Some(link) = self.link.get() {
            return Ok(Arc::clone(link));
        }
        if self.settings.get().is_none() {
            return Err(PluginError::FeatureNotReady {
                feature: <dyn Transport as Feature>::KEY,
            });
        }
        let settings = read_settings(&self.settings)?;
        let link = self.link.get_or_init(|| {
            Arc::new(RadioLink::new(BLUETOOTH_PLUGIN, TransportKind::Bluetooth, settings.max_frame_size))
        });
        Ok(Arc::clone(link))
    }
}

/// Publishes a Bluetooth transport, usable as soon as the context is attached.
#[derive(Default)]
pub struct BluetoothPlugin {
    state: Arc<BluetoothState>,
}

impl BluetoothPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The link, once something asked for it.
    pub fn link(&self) -> Option<Arc<RadioLink>> {
        self.state.link.get().cloned()
    }
}

impl Plugin for BluetoothPlugin {
    fn name(&self) -> &str {
        BLUETOOTH_PLUGIN
    }

    fn attach_context(&self, context: Arc<AppContext>) {
        settings_for(context, BLUETOOTH_PLUGIN, &self.state.settings);
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        let state = Arc::clone(&self.state);
        let provider = FeatureProvider::new(move || state.link().map(|link| link as Arc<dyn Transport>));
        vec![FeatureWrapper::new(provider)]
    }

    fn customization_options(&self) -> ConfigData {
        read_settings(&self.state.settings).unwrap_or_default().to_config()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        self.state.link()?;
        debug!("Bluetooth transport ready");
        Ok(())
    }

    fn do_after_initialize(&self) -> Result<(), PluginError> {
        check_native_stack(BLUETOOTH_PLUGIN, &read_settings(&self.state.settings)?)?;
        info!("Bluetooth transport advertising");
        Ok(())
    }
}

/// Publishes a Wi-Fi Direct transport that only exists once the group is formed
/// in `initialize`.
#[derive(Default)]
pub struct WifiDirectPlugin {
    settings: OnceLock<Result<RadioSettings, String>>,
    slot: FeatureSlot<dyn Transport>,
    link: OnceLock<Arc<RadioLink>>,
}

impl WifiDirectPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self) -> Option<Arc<RadioLink>> {
        self.link.get().cloned()
    }
}

impl Plugin for WifiDirectPlugin {
    fn name(&self) -> &str {
        WIFI_DIRECT_PLUGIN
    }

    fn attach_context(&self, context: Arc<AppContext>) {
        settings_for(context, WIFI_DIRECT_PLUGIN, &self.settings);
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        vec![FeatureWrapper::new(self.slot.provider())]
    }

    fn customization_options(&self) -> ConfigData {
        read_settings(&self.settings).unwrap_or_default().to_config()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        let settings = read_settings(&self.settings)?;
        let link = self.link.get_or_init(|| {
            Arc::new(RadioLink::new(WIFI_DIRECT_PLUGIN, TransportKind::WifiDirect, settings.max_frame_size))
        });
        let transport: Arc<dyn Transport> = link.clone();
        self.slot.fill(transport);
        debug!("Wi-Fi Direct group formed");
        Ok(())
    }

    fn do_after_initialize(&self) -> Result<(), PluginError> {
        check_native_stack(WIFI_DIRECT_PLUGIN, &read_settings(&self.settings)?)
    }
}
