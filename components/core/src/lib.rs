pub mod home_assistant;
pub mod internal;
pub mod throttle;
pub mod utils;

use home_assistant::sensors::Component;
use internal::sensors::InternalComponent;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast::{Receiver, Sender};
use serde::Deserialize;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A loadable integration. The binary instantiates one module per configured
/// top-level section, collects the components it announces and then drives it
/// on the shared message bus.
pub trait Module
where
    Self: Send,
{
    fn validate(&mut self) -> Result<(), String>;

    fn init(&mut self) -> Result<Vec<InternalComponent>, String>;

    fn run(
        &self,
        sender: Sender<ChangedMessage>,
        receiver: Receiver<PublishedMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<(), Box<dyn std::error::Error>>> + Send + 'static>>;
}

/// Sent by modules towards the host when something they own changed.
#[derive(Debug, Clone)]
pub enum ChangedMessage {
    SensorValueChange { key: String, value: f64 },
}

/// Broadcast by the host towards every module.
#[derive(Debug, Clone)]
pub enum PublishedMessage {
    Components { components: Vec<Component> },
    SensorValueChanged { key: String, value: f64 },
}

#[derive(Clone, Deserialize, Debug)]
pub struct DsmrHome {
    pub name: String,
    pub friendly_name: Option<String>,
    pub area: Option<String>,
}
