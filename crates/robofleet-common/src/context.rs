//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the robot lifecycle runtime."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

const MAX_IDENTIFIER_LEN: usize = 128;

/// Errors raised while building or honouring a [`RequestContext`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// A caller supplied identifier is malformed.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending identifier.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },
    /// The caller's deadline elapsed before the wrapped call completed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

fn validate_identifier(field: &'static str, raw: &str) -> Result<(), ContextError> {
    if raw.trim().is_empty() {
        return Err(ContextError::Validation {
            field,
            reason: "must not be empty".into(),
        });
    }
    if raw.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ContextError::Validation {
            field,
            reason: format!("exceeds {MAX_IDENTIFIER_LEN} characters"),
        });
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ContextError::Validation {
            field,
            reason: "must not contain whitespace or control characters".into(),
        });
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn parse(raw: impl Into<String>) -> Result<Self, ContextError> {
                let raw = raw.into();
                validate_identifier($field, &raw)?;
                Ok(Self(raw))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ContextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ContextError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

identifier!(
    /// Multi-tenant ownership boundary.
    TeamId,
    "team id"
);
identifier!(
    /// Robot identifier, unique within a team.
    RobotId,
    "robot id"
);
identifier!(
    /// ECU identifier.
    EcuId,
    "ecu id"
);
identifier!(
    /// Identity of whoever issued the request.
    ActorId,
    "actor id"
);

/// Category of principal acting on the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Human operator authenticated upstream.
    User,
    /// Device acting on its own behalf.
    Robot,
    /// Internal automation.
    System,
}

/// Pre-validated caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Principal category.
    pub kind: ActorKind,
    /// Principal identifier.
    pub id: ActorId,
}

impl Actor {
    /// Construct a user actor.
    pub fn user(id: ActorId) -> Self {
        Self {
            kind: ActorKind::User,
            id,
        }
    }

    /// Construct a system actor.
    pub fn system(id: ActorId) -> Self {
        Self {
            kind: ActorKind::System,
            id,
        }
    }
}

/// Request-scoped context passed explicitly into every adapter call.
///
/// Carries the caller identity and team that upstream authentication has
/// already validated, plus the caller's deadline. The core never invents a
/// deadline of its own.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    actor: Actor,
    team_id: TeamId,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a context without a deadline.
    pub fn new(actor: Actor, team_id: TeamId) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor,
            team_id,
            deadline: None,
        }
    }

    /// Attach an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Override the generated request id (e.g. with one propagated from a gateway).
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Remaining budget, `None` when the caller set no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(remaining) if remaining.is_zero())
    }

    /// Drive `fut` to completion within the caller's deadline.
    pub async fn bounded<F, T>(&self, fut: F) -> Result<T, ContextError>
    where
        F: Future<Output = T>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ContextError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}
