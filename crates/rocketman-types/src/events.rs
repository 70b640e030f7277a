//! Event types and routing keys for the rocket event bus.
//!
//! Every message travels on a hierarchical routing key of the form
//! `rocket.<id>.<event>` and carries a [`RocketEnvelope`] as its JSON body.
//!
//! | Event | Published by | Consumed by |
//! |-------|--------------|-------------|
//! | `created` | rocket service | nobody (audit) |
//! | `launched` | rocket service | simulation loop, relay |
//! | `updated` | simulation loop, crash watcher | simulation loop, relay |
//! | `crashed` | rocket service (abort), simulation loop | crash watcher, relay |
//! | `nofuel` | simulation loop | nobody (notification) |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::RocketId;
use crate::structs::Rocket;

/// Leading segment shared by every rocket routing key.
pub const TOPIC_PREFIX: &str = "rocket";

/// The kind of event carried on a routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A rocket was created on the launch pad.
    Created,
    /// The owner launched the rocket.
    Launched,
    /// A physics tick or terminal transition changed the rocket.
    Updated,
    /// The rocket crashed (or was asked to).
    Crashed,
    /// The rocket burned its last fuel.
    #[serde(rename = "nofuel")]
    NoFuel,
}

impl EventKind {
    /// Every event kind, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Launched,
        Self::Updated,
        Self::Crashed,
        Self::NoFuel,
    ];

    /// The routing key segment for this event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Launched => "launched",
            Self::Updated => "updated",
            Self::Crashed => "crashed",
            Self::NoFuel => "nofuel",
        }
    }

    /// Parse a routing key segment.
    pub fn parse(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == segment)
    }

    /// Whether the WebSocket relay forwards this event to clients.
    pub const fn is_relayed(self) -> bool {
        matches!(self, Self::Launched | Self::Updated | Self::Crashed)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed routing key: `rocket.<id>.<event>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    /// The rocket the event concerns.
    pub rocket_id: RocketId,
    /// What happened.
    pub kind: EventKind,
}

impl Topic {
    /// Build a topic for a rocket event.
    pub const fn new(rocket_id: RocketId, kind: EventKind) -> Self {
        Self { rocket_id, kind }
    }

    /// Parse a routing key. Returns `None` for anything that is not
    /// exactly `rocket.<id>.<known event>`.
    pub fn parse(subject: &str) -> Option<Self> {
        let mut parts = subject.split('.');
        let prefix = parts.next()?;
        let id = parts.next()?;
        let kind = parts.next()?;
        if prefix != TOPIC_PREFIX || id.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            rocket_id: RocketId::new(id),
            kind: EventKind::parse(kind)?,
        })
    }

    /// Subscription pattern matching `kind` events for any rocket.
    pub fn any_rocket(kind: EventKind) -> String {
        format!("{TOPIC_PREFIX}.*.{kind}")
    }

    /// Subscription pattern matching every event for one rocket.
    pub fn all_for(rocket_id: &RocketId) -> String {
        format!("{TOPIC_PREFIX}.{rocket_id}.*")
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{TOPIC_PREFIX}.{}.{}", self.rocket_id, self.kind)
    }
}

/// Whether `subject` matches a subscription `pattern`.
///
/// Patterns are dot-separated; `*` matches exactly one segment and a
/// trailing `>` matches one or more remaining segments.
pub fn topic_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_parts = pattern.split('.');
    let mut subject_parts = subject.split('.');
    loop {
        match (pattern_parts.next(), subject_parts.next()) {
            (Some(">"), Some(_)) => return pattern_parts.next().is_none(),
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// The JSON body of every rocket event.
///
/// Wire format: `{"rocket": {...}, "username": "<owner>"}`, with an
/// optional `"status"` that a `crashed` event uses to name the crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RocketEnvelope {
    /// Snapshot of the rocket at publish time.
    pub rocket: Rocket,
    /// The owning user.
    pub username: String,
    /// Crash label requested by the publisher of a `crashed` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RocketEnvelope {
    /// Wrap a snapshot of `rocket`, addressed to its owner.
    pub fn snapshot(rocket: &Rocket) -> Self {
        Self {
            rocket: rocket.clone(),
            username: rocket.owner.clone(),
            status: None,
        }
    }

    /// Attach a crash label.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}
