//! Talk session: encodes voice with the audio route and fans frames out over
//! every available transport.
use std::sync::Arc;

use log::{debug, info, warn};
use talkie_audio::AudioRoute;
use talkie_core::plugin_system::dependency::{Dependency, Injected};
use talkie_core::plugin_system::feature::{Feature, FeatureKey, FeatureProvider, FeatureSlot, FeatureWrapper};
use talkie_core::plugin_system::traits::{Plugin, PluginError};
use talkie_transport::Transport;

pub const PLUGIN_NAME: &str = "session";

/// Outcome of one transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transports the frame went out on.
    pub delivered: Vec<String>,
    /// Transports that refused the frame, with the reason.
    pub failed: Vec<(String, String)>,
}

pub trait TalkSession: Send + Sync {
    fn transports(&self) -> Vec<String>;
    /// Encodes `pcm` and broadcasts it on every transport. Fails only when no
    /// transport accepted the frame.
    fn transmit(&self, pcm: &[i16]) -> Result<Delivery, PluginError>;
}

impl Feature for dyn TalkSession {
    const KEY: FeatureKey = FeatureKey::new("talkie.session");
}

pub struct FanOutSession {
    audio: Arc<dyn AudioRoute>,
    transports: Vec<Arc<dyn Transport>>,
}

impl FanOutSession {
    pub fn new(audio: Arc<dyn AudioRoute>, transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { audio, transports }
    }
}

impl TalkSession for FanOutSession {
    fn transports(&self) -> Vec<String> {
        self.transports.iter().map(|transport| transport.name().to_string()).collect()
    }

    fn transmit(&self, pcm: &[i16]) -> Result<Delivery, PluginError> {
        let frame = self.audio.encode(pcm);
        let mut delivery = Delivery {
            delivered: Vec::new(),
            failed: Vec::new(),
        };
        for transport in &self.transports {
            match transport.broadcast(&frame) {
                Ok(_) => delivery.delivered.push(transport.name().to_string()),
                Err(e) => {
                    warn!("Transport '{}' dropped a frame: {}", transport.name(), e);
                    delivery.failed.push((transport.name().to_string(), e.to_string()));
                }
            }
        }
        if delivery.delivered.is_empty() {
            return Err(PluginError::ExecutionError(format!(
                "No transport accepted the frame ({} tried)",
                delivery.failed.len()
            )));
        }
        Ok(delivery)
    }
}

/// Requires every [`Transport`] and the [`AudioRoute`]; publishes [`TalkSession`]
/// once both are usable.
pub struct SessionPlugin {
    audio: Injected<FeatureProvider<dyn AudioRoute>>,
    transports: Injected<Vec<FeatureProvider<dyn Transport>>>,
    session: FeatureSlot<dyn TalkSession>,
}

impl SessionPlugin {
    pub fn new() -> Self {
        Self {
            audio: Injected::new("audio route"),
            transports: Injected::new("transports"),
            session: FeatureSlot::new(),
        }
    }
}

impl Default for SessionPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SessionPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn api(&self) -> Vec<FeatureWrapper> {
        vec![FeatureWrapper::new(self.session.provider())]
    }

    fn dependency(&self) -> Dependency {
        Dependency::builder()
            .require::<dyn AudioRoute, _>(self.audio.setter())
            .require_set::<dyn Transport, _>(self.transports.setter())
            .build()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        if self.session.is_filled() {
            return Ok(());
        }
        let audio = self.audio.feature()?;
        let transports = self
            .transports
            .get()?
            .iter()
            .map(FeatureProvider::get)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Session bound to {} transport(s)", transports.len());
        self.session.fill(Arc::new(FanOutSession::new(audio, transports)));
        Ok(())
    }

    fn do_after_initialize(&self) -> Result<(), PluginError> {
        let session = self.session.get()?;
        info!("Talk session ready on [{}]", session.transports().join(", "));
        Ok(())
    }
}
