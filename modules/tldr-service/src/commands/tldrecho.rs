//! tldrecho command - sets or clears where full listings are delivered

use super::CommandContext;
use crate::echo::EchoSettings;
use crate::messages::{self, Translator};
use tldr_types::OutboundMessage;

/// Execute the tldrecho command (admin only, checked by the caller)
pub fn execute(
    value: Option<&str>,
    ctx: &CommandContext<'_>,
    echo: &EchoSettings,
    tr: &dyn Translator,
) -> Result<Vec<OutboundMessage>, String> {
    echo.set(ctx.conv_id, value)?;

    let reply = match value {
        None => tr.render(messages::ECHO_CLEARED, &[]),
        Some(v) => tr.render(messages::ECHO_SET, &[&v]),
    };
    Ok(vec![OutboundMessage::to_conversation(ctx.conv_id, reply)])
}
