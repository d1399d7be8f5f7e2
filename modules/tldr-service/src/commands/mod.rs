//! Chat command handling for the tldr verbs

mod help;
mod tldr;
mod tldrecho;

use crate::echo::EchoSettings;
use crate::router::CommandRouter;
use tldr_types::OutboundMessage;

/// Commands understood by the tldr service
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Note operation: `tldr [args...]`
    Tldr(Vec<String>),
    /// Set or clear the echo destination: `tldrecho [group|PM]`
    TldrEcho(Option<String>),
    /// `tldrecho` with more than one argument
    TldrEchoUsage,
    /// Show help: `help`
    Help,
}

impl Command {
    pub fn requires_admin(&self) -> bool {
        matches!(self, Command::TldrEcho(_) | Command::TldrEchoUsage)
    }
}

/// Who sent a command, and where
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub conv_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub is_admin: bool,
}

/// `/bot` or a leading `<@id>` mention addressed to the bot
fn is_bot_prefix(token: &str) -> bool {
    token.eq_ignore_ascii_case("/bot") || (token.starts_with("<@") && token.ends_with('>'))
}

/// Parse a command from text
pub fn parse(text: &str) -> Option<Command> {
    let mut parts: Vec<&str> = text.split_whitespace().collect();
    if parts.first().is_some_and(|p| is_bot_prefix(p)) {
        parts.remove(0);
    }

    log::debug!(
        "TL;DR commands: Parsing '{}' -> {} parts: {:?}",
        text,
        parts.len(),
        parts
    );

    let command = parts.first()?.to_lowercase();
    let args: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();

    match command.as_str() {
        "tldr" => Some(Command::Tldr(args)),
        "tldrecho" => match args.as_slice() {
            [] => Some(Command::TldrEcho(None)),
            [value] => Some(Command::TldrEcho(Some(value.clone()))),
            _ => Some(Command::TldrEchoUsage),
        },
        "help" | "?" => Some(Command::Help),
        _ => {
            log::debug!("TL;DR commands: Unknown command '{}'", command);
            None
        }
    }
}

/// Execute a command and return the messages the host should deliver
pub fn execute(
    cmd: Command,
    ctx: &CommandContext<'_>,
    router: &CommandRouter,
    echo: &EchoSettings,
) -> Result<Vec<OutboundMessage>, String> {
    if cmd.requires_admin() && !ctx.is_admin {
        log::info!(
            "TL;DR commands: Denied {:?} for non-admin user {}",
            cmd,
            ctx.user_id
        );
        return Ok(vec![OutboundMessage::to_conversation(
            ctx.conv_id,
            permission_denied_message(),
        )]);
    }

    match cmd {
        Command::Tldr(params) => tldr::execute(&params, ctx, router, echo),
        Command::TldrEcho(value) => {
            tldrecho::execute(value.as_deref(), ctx, echo, router.translator())
        }
        Command::TldrEchoUsage => Ok(vec![OutboundMessage::to_conversation(
            ctx.conv_id,
            "Usage: `/bot tldrecho <group|PM>`".to_string(),
        )]),
        Command::Help => Ok(vec![OutboundMessage::to_conversation(
            ctx.conv_id,
            help::execute(),
        )]),
    }
}

/// Message shown when a user tries to run an admin command
pub fn permission_denied_message() -> String {
    "You don't have permission to run that command.\n\n\
    **Available commands:**\n\
    - `/bot tldr <message>` - Add a TL;DR\n\
    - `/bot tldr` - Show all TL;DRs\n\
    - `/bot help` - Show available commands"
        .to_string()
}
