//! User-facing message templates and the translation hook applied to them.
//!
//! Templates use positional `{}` placeholders so a translated template can be
//! filled at runtime.

use std::fmt::{self, Write};

pub const NOT_FOUND: &str = "TL;DR not found";
pub const POSITION_NOT_FOUND: &str = "TL;DR #{} not found";
pub const LIST_HEADER: &str = "**TL;DR ({} stored):**";
pub const LIST_LINE: &str = "{}. {} **{} ago**";
pub const REMOVED: &str = "TL;DR #{} removed - \"{}\"";
pub const CLEARED: &str = "All TL;DRs cleared";
pub const EDITED: &str = "TL;DR #{} edited - \"{}\" -> \"{}\"";
pub const UNKNOWN_EDIT: &str = "Unknown Command at \"tldr edit\"";
pub const ADDED: &str = "_{}_ added to TL;DR. Count: {}";
pub const ECHO_CLEARED: &str = "**TLDR echo setting for this conversation has been cleared**";
pub const ECHO_SET: &str = "**TLDR echo for this conversation is:**\n{}";
pub const PM_BREADCRUMB: &str = "_{}, I've sent you the info in a PM ;-)_";

/// Maps a fixed message template to its localized form.
pub trait Translator: Send + Sync {
    fn translate(&self, msgid: &str) -> String;

    /// Translate `msgid` and fill its placeholders.
    fn render(&self, msgid: &str, args: &[&dyn fmt::Display]) -> String {
        fill(&self.translate(msgid), args)
    }
}

/// Returns every template unchanged.
pub struct Untranslated;

impl Translator for Untranslated {
    fn translate(&self, msgid: &str) -> String {
        msgid.to_string()
    }
}

/// Substitute `{}` placeholders left to right. Surplus placeholders are kept
/// verbatim and argument text is never rescanned.
pub fn fill(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        match args.next() {
            Some(arg) => {
                let _ = write!(out, "{}", arg);
            }
            None => out.push_str("{}"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shouting;

    impl Translator for Shouting {
        fn translate(&self, msgid: &str) -> String {
            msgid.to_uppercase()
        }
    }

    #[test]
    fn test_fill_in_order() {
        assert_eq!(fill(EDITED, &[&1, &"a", &"b"]), "TL;DR #1 edited - \"a\" -> \"b\"");
    }

    #[test]
    fn test_fill_missing_args_keeps_placeholder() {
        assert_eq!(fill("{} and {}", &[&"x"]), "x and {}");
    }

    #[test]
    fn test_fill_does_not_rescan_arguments() {
        assert_eq!(fill(ADDED, &[&"{}", &3]), "_{}_ added to TL;DR. Count: 3");
    }

    #[test]
    fn test_render_translates_before_filling() {
        assert_eq!(Shouting.render(POSITION_NOT_FOUND, &[&"7"]), "TL;DR #7 NOT FOUND");
        assert_eq!(Untranslated.render(CLEARED, &[]), "All TL;DRs cleared");
    }
}
