use std::sync::{Arc, OnceLock};

use log::info;
use talkie_core::plugin_system::dependency::{Dependency, Injected};
use talkie_core::plugin_system::feature::FeatureProvider;
use talkie_core::plugin_system::traits::{Plugin, PluginError};
use talkie_session::{Delivery, TalkSession};
use talkie_transport::Transport;

pub const PLUGIN_NAME: &str = "ptt";
const HELLO_FRAME: &[u8] = b"TALKIE-HELLO";

/// The push-to-talk button. Talks through the session and, when the user picked
/// one transport, announces itself on that link first.
pub struct PushToTalkPlugin {
    dedicated_link: bool,
    session: Injected<FeatureProvider<dyn TalkSession>>,
    link: Injected<FeatureProvider<dyn Transport>>,
    announced_on: OnceLock<String>,
}

impl PushToTalkPlugin {
    pub fn new(dedicated_link: bool) -> Self {
        Self {
            dedicated_link,
            session: Injected::new("talk session"),
            link: Injected::new("dedicated transport"),
            announced_on: OnceLock::new(),
        }
    }

    pub fn announced_on(&self) -> Option<&str> {
        self.announced_on.get().map(String::as_str)
    }

    /// Sends `frames` frames of silence, `samples` samples each.
    pub fn talk(&self, frames: u32, samples: usize) -> Result<Vec<Delivery>, PluginError> {
        let session = self.session.feature()?;
        let silence = vec![0i16; samples];
        (0..frames).map(|_| session.transmit(&silence)).collect()
    }
}

impl Plugin for PushToTalkPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn dependency(&self) -> Dependency {
        Dependency::builder()
            .require::<dyn TalkSession, _>(self.session.setter())
            .require_if::<dyn Transport, _>(self.dedicated_link, self.link.setter())
            .build()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        self.session.feature().map(|_| ())
    }

    fn do_after_initialize(&self) -> Result<(), PluginError> {
        if !self.dedicated_link {
            return Ok(());
        }
        let link = self.link.feature()?;
        link.broadcast(HELLO_FRAME)?;
        info!("Announced on '{}'", link.name());
        let _ = self.announced_on.set(link.name().to_string());
        Ok(())
    }
}

pub fn shared(dedicated_link: bool) -> Arc<PushToTalkPlugin> {
    Arc::new(PushToTalkPlugin::new(dedicated_link))
}
