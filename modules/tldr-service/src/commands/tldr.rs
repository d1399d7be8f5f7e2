//! tldr command - runs the note operation and plans its delivery

use super::CommandContext;
use crate::echo::EchoSettings;
use crate::messages::{self, Translator};
use crate::router::{CommandRouter, DisplayMode};
use tldr_types::OutboundMessage;

/// Execute the tldr command. A full listing goes to the user privately when
/// the conversation's echo setting asks for it; everything else goes back to
/// the conversation.
pub fn execute(
    params: &[String],
    ctx: &CommandContext<'_>,
    router: &CommandRouter,
    echo: &EchoSettings,
) -> Result<Vec<OutboundMessage>, String> {
    let outcome = router.dispatch(ctx.conv_id, params)?;
    let Some(message) = outcome.message else {
        return Ok(Vec::new());
    };

    if outcome.display == DisplayMode::All && echo.is_private(ctx.conv_id)? {
        log::info!(
            "TL;DR: Sending listing for conversation {} to user {} privately",
            ctx.conv_id,
            ctx.user_id
        );
        let breadcrumb = router
            .translator()
            .render(messages::PM_BREADCRUMB, &[&ctx.user_name]);
        return Ok(vec![
            OutboundMessage::to_user(ctx.user_id, message),
            OutboundMessage::to_conversation(ctx.conv_id, breadcrumb),
        ]);
    }

    Ok(vec![OutboundMessage::to_conversation(ctx.conv_id, message)])
}
