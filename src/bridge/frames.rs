//! Bridge wire frames.
//!
//! One JSON object per line, discriminated by `"type"`. Inbound frames come
//! from the platform adapter; outbound frames are requests back to it.

use crate::db::ExemptionRecord;
use crate::error::CommandError;
use crate::ids::{Identity, MessageId, Scope, SpaceId};
use serde::{Deserialize, Serialize};

/// Frames read from the platform adapter.
///
/// Command frames carry an optional correlation `id` echoed in the reply.
/// A missing `space` on exemption commands means the global scope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A message was edited.
    Edit {
        actor: Identity,
        space: SpaceId,
        message: MessageId,
    },
    /// Media or a sticker was posted.
    Media {
        actor: Identity,
        space: SpaceId,
        message: MessageId,
    },
    /// The bot left or was removed from a space.
    SpaceRemoved { space: SpaceId },
    /// Full administrator roster for a space. Replaces any previous roster.
    Admins {
        space: SpaceId,
        admins: Vec<Identity>,
    },
    Grant {
        id: Option<u64>,
        invoker: Identity,
        space: Option<SpaceId>,
        identity: Identity,
    },
    Revoke {
        id: Option<u64>,
        invoker: Identity,
        space: Option<SpaceId>,
        identity: Identity,
    },
    List {
        id: Option<u64>,
        invoker: Identity,
        space: Option<SpaceId>,
    },
    SetDelay {
        id: Option<u64>,
        invoker: Identity,
        space: SpaceId,
        seconds: i64,
    },
    ResetDelay {
        id: Option<u64>,
        invoker: Identity,
        space: SpaceId,
    },
    GetDelay { id: Option<u64>, space: SpaceId },
}

/// Map an optional space to an exemption scope.
pub fn scope_of(space: Option<SpaceId>) -> Scope {
    space.map_or(Scope::Global, Scope::Space)
}

/// Frames written to the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Delete a message.
    Remove { space: SpaceId, message: MessageId },
    /// Post a text notice.
    Notify { space: SpaceId, text: String },
    /// Result of an administrative command.
    Reply(Reply),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<Identity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existed: Option<bool>,
}

impl Reply {
    pub fn ok(id: Option<u64>) -> Self {
        Self {
            id,
            ok: true,
            error: None,
            identities: None,
            delay_secs: None,
            existed: None,
        }
    }

    pub fn failed(id: Option<u64>, err: &CommandError) -> Self {
        Self {
            ok: false,
            error: Some(ReplyError {
                code: err.error_code(),
                message: err.to_string(),
            }),
            ..Self::ok(id)
        }
    }

    pub fn with_identities(mut self, records: &[ExemptionRecord]) -> Self {
        self.identities = Some(records.iter().map(|r| r.identity).collect());
        self
    }

    pub fn with_delay(mut self, secs: u64) -> Self {
        self.delay_secs = Some(secs);
        self
    }

    pub fn with_existed(mut self, existed: bool) -> Self {
        self.existed = Some(existed);
        self
    }
}
