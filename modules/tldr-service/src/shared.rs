//! Entry point other components use to run tldr operations directly.
//!
//! Callers hand over a JSON object with `params` (list of strings) and
//! `conv_id` and get back only the rendered reply text.

use crate::router::CommandRouter;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tldr_types::SharedTldrRequest;

pub const SHARED_TLDR: &str = "plugin_tldr_shared";

/// Structural problem with a shared-call payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedCallError {
    NotAnObject,
    MissingKey(&'static str),
    InvalidType {
        key: &'static str,
        expected: &'static str,
    },
}

impl fmt::Display for SharedCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedCallError::NotAnObject => write!(f, "args must be a dictionary"),
            SharedCallError::MissingKey(key) => write!(f, "'{}' key missing in args", key),
            SharedCallError::InvalidType { key, expected } => {
                write!(f, "'{}' must be {}", key, expected)
            }
        }
    }
}

impl std::error::Error for SharedCallError {}

/// Failure of a shared call: bad input, or the operation itself failed.
#[derive(Debug)]
pub enum SharedError {
    Input(SharedCallError),
    Store(String),
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedError::Input(e) => write!(f, "{}", e),
            SharedError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SharedError {}

impl From<SharedCallError> for SharedError {
    fn from(e: SharedCallError) -> Self {
        SharedError::Input(e)
    }
}

/// A callable exposed to other components under a fixed name.
pub trait SharedCommand: Send + Sync {
    fn name(&self) -> &'static str;
    /// Run the command. `Ok(None)` means it produced no reply.
    fn call(&self, args: &Value) -> Result<Option<String>, SharedError>;
}

/// Validate a raw shared-call payload. `params` is checked before `conv_id`.
pub fn parse_request(args: &Value) -> Result<SharedTldrRequest, SharedCallError> {
    let obj = args.as_object().ok_or(SharedCallError::NotAnObject)?;

    let params = obj
        .get("params")
        .ok_or(SharedCallError::MissingKey("params"))?;
    let conv_id = obj
        .get("conv_id")
        .ok_or(SharedCallError::MissingKey("conv_id"))?;

    let params = params
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(String::from))
                .collect::<Option<Vec<String>>>()
        })
        .ok_or(SharedCallError::InvalidType {
            key: "params",
            expected: "a list of strings",
        })?;
    let conv_id = conv_id
        .as_str()
        .ok_or(SharedCallError::InvalidType {
            key: "conv_id",
            expected: "a string",
        })?
        .to_string();

    Ok(SharedTldrRequest { params, conv_id })
}

pub struct TldrShared {
    router: Arc<CommandRouter>,
}

impl TldrShared {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }

    /// Run an already validated request.
    pub fn run(&self, req: &SharedTldrRequest) -> Result<Option<String>, String> {
        let outcome = self.router.dispatch(&req.conv_id, &req.params)?;
        Ok(outcome.message)
    }
}

impl SharedCommand for TldrShared {
    fn name(&self) -> &'static str {
        SHARED_TLDR
    }

    fn call(&self, args: &Value) -> Result<Option<String>, SharedError> {
        let req = parse_request(args)?;
        self.run(&req).map_err(SharedError::Store)
    }
}
