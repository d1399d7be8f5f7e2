//! Shared types for the tldr service and its RPC clients.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// A single note as seen through the ordered projection of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteView {
    /// 1-based position, only valid for the request that produced it
    pub position: usize,
    pub timestamp: f64,
    pub text: String,
    pub age: String,
}

/// Where an outbound message should be delivered by the host transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DeliveryTarget {
    Conversation(String),
    User(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub target: DeliveryTarget,
    pub text: String,
}

impl OutboundMessage {
    pub fn to_conversation(conv_id: &str, text: impl Into<String>) -> Self {
        Self {
            target: DeliveryTarget::Conversation(conv_id.to_string()),
            text: text.into(),
        }
    }

    pub fn to_user(user_id: &str, text: impl Into<String>) -> Self {
        Self {
            target: DeliveryTarget::User(user_id.to_string()),
            text: text.into(),
        }
    }
}

// =====================================================
// RPC Request Types
// =====================================================

/// A raw chat command as received by the host.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandRequest {
    pub conv_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub is_admin: bool,
    pub text: String,
}

/// Typed form of the shared-call payload. The service also accepts arbitrary
/// JSON on the shared endpoint and validates it itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct SharedTldrRequest {
    pub params: Vec<String>,
    pub conv_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub conv_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupRestoreRequest {
    pub notes: Vec<BackupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub conv_id: String,
    /// Storage key exactly as persisted
    pub timestamp: String,
    pub text: String,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoStatus {
    pub conv_id: String,
    /// Value stored for the conversation, if any
    pub conversation_value: Option<String>,
    /// Value actually applied after falling back to the global default
    pub effective: String,
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub conversations: usize,
    pub total_notes: usize,
    /// Conversations with a request in flight
    pub active_lanes: usize,
}
