//! Container lifecycle events, decoded from the Docker event stream.
//!
//! Only container-typed events with a lifecycle action we act on survive
//! decoding; everything else (image pulls, network events, exec_create
//! noise) is dropped before it reaches the reconciler.

use bollard::models::{EventMessage, EventMessageTypeEnum};

/// Lifecycle transition the reconciler reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Container entered the running state; rules are applied.
    Start,
    /// Container exited; rules are torn down.
    Die,
    /// Container was killed; treated identically to `Die`.
    Kill,
}

impl LifecycleAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(Self::Start),
            "die" => Some(Self::Die),
            "kill" => Some(Self::Kill),
            _ => None,
        }
    }

    /// Whether this action tears rules down rather than applying them.
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Die | Self::Kill)
    }
}

/// A decoded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Full container id.
    pub container_id: String,
    /// Container name from the event actor attributes, when present.
    pub container_name: Option<String>,
    /// What happened.
    pub action: LifecycleAction,
}

impl LifecycleEvent {
    /// Decodes a raw Docker event. Returns `None` for anything that is not
    /// a container start/die/kill with an actor id.
    pub fn from_message(message: &EventMessage) -> Option<Self> {
        if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
            return None;
        }
        let action = LifecycleAction::parse(message.action.as_deref()?)?;
        let actor = message.actor.as_ref()?;
        let container_id = actor.id.clone()?;
        let container_name = actor
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get("name").cloned());
        Some(Self {
            container_id,
            container_name,
            action,
        })
    }
}
