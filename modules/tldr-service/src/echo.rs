//! Per-conversation echo destination for bulk listings.
//!
//! Stored at `conversations[conv_id].tldr_echo` in memory. When a
//! conversation has no value the global `tldr_echo` from the config store
//! applies, initialised to `"group"` the first time it is needed.

use crate::db::Memory;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const CONVERSATIONS_ROOT: &str = "conversations";
pub const ECHO_KEY: &str = "tldr_echo";

/// Deliver bulk listings to the requesting user privately.
pub const ECHO_PRIVATE: &str = "PM";
pub const ECHO_GROUP: &str = "group";

pub struct EchoSettings {
    memory: Arc<dyn Memory>,
    config: Arc<dyn Memory>,
}

impl EchoSettings {
    pub fn new(memory: Arc<dyn Memory>, config: Arc<dyn Memory>) -> Self {
        Self { memory, config }
    }

    fn ensure_conversation(&self, conv_id: &str) -> Result<(), String> {
        if !self.memory.exists(&[CONVERSATIONS_ROOT]) {
            self.memory
                .set(&[CONVERSATIONS_ROOT], Value::Object(Map::new()))?;
        }
        if !self.memory.exists(&[CONVERSATIONS_ROOT, conv_id]) {
            self.memory
                .set(&[CONVERSATIONS_ROOT, conv_id], Value::Object(Map::new()))?;
        }
        Ok(())
    }

    /// Store a conversation's setting. `None` clears it, after which the
    /// global default applies again.
    pub fn set(&self, conv_id: &str, value: Option<&str>) -> Result<(), String> {
        self.ensure_conversation(conv_id)?;
        let stored = value.map_or(Value::Null, |v| Value::String(v.to_string()));
        self.memory
            .set(&[CONVERSATIONS_ROOT, conv_id, ECHO_KEY], stored)?;
        self.memory.save()?;

        log::info!(
            "TL;DR: Echo setting for conversation {} set to {:?}",
            conv_id,
            value
        );
        Ok(())
    }

    /// The conversation's own value, if it has one.
    pub fn conversation_value(&self, conv_id: &str) -> Result<Option<String>, String> {
        self.ensure_conversation(conv_id)?;
        Ok(
            match self.memory.get(&[CONVERSATIONS_ROOT, conv_id, ECHO_KEY]) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s),
                Some(other) => Some(other.to_string()),
            },
        )
    }

    /// The value that decides delivery for this conversation.
    pub fn effective(&self, conv_id: &str) -> Result<String, String> {
        match self.conversation_value(conv_id)? {
            Some(value) => Ok(value),
            None => global_default(self.config.as_ref()),
        }
    }

    pub fn is_private(&self, conv_id: &str) -> Result<bool, String> {
        Ok(self.effective(conv_id)? == ECHO_PRIVATE)
    }
}

/// Global echo default from `config`, writing `"group"` into it first if it
/// holds no usable value.
pub fn global_default(config: &dyn Memory) -> Result<String, String> {
    if let Some(Value::String(value)) = config.get(&[ECHO_KEY]) {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    log::info!("TL;DR: No global echo default configured, using '{}'", ECHO_GROUP);
    config.set(&[ECHO_KEY], Value::String(ECHO_GROUP.to_string()))?;
    config.save()?;
    Ok(ECHO_GROUP.to_string())
}

/// Overwrite the global echo default.
pub fn set_global_default(config: &dyn Memory, value: &str) -> Result<(), String> {
    config.set(&[ECHO_KEY], Value::String(value.to_string()))?;
    config.save()
}
