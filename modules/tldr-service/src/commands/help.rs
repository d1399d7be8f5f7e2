//! Help command - shows available commands

/// Execute the help command
pub fn execute() -> String {
    "**TL;DR Commands**\n\n\
    **For all users:**\n\
    - `/bot tldr <message>` - Add a short message to this conversation's TL;DR list\n\
    - `/bot tldr` - Show every TL;DR\n\
    - `/bot tldr <number>` - Show a single TL;DR\n\
    - `/bot tldr edit <number> <new message>` - Edit a single TL;DR\n\
    - `/bot tldr clear <number>` - Delete a single TL;DR\n\
    - `/bot tldr clear` - Delete every TL;DR\n\n\
    **Admin only:**\n\
    - `/bot tldrecho <group|PM>` - Send the full TL;DR list to the conversation or by PM\n\
    - `/bot tldrecho` - Clear the setting and use the bot default"
        .to_string()
}
