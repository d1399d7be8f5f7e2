//! Interprets a tldr parameter list as exactly one note operation and renders
//! the reply.

use crate::messages::{self, Translator};
use crate::notes::{NoteStore, Selector};
use std::sync::Arc;

/// What kind of display, if any, a reply represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Bulk listing of every note; the caller may deliver it privately
    All,
    /// A single note was revealed at this 1-based position; never redirected
    Single(usize),
    /// Nothing was displayed (mutations, misses)
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// `None` when the parameters matched no command
    pub message: Option<String>,
    pub display: DisplayMode,
}

impl Outcome {
    fn reply(message: String) -> Self {
        Self {
            message: Some(message),
            display: DisplayMode::None,
        }
    }
}

/// The single operation a parameter list resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    List(Selector),
    /// `raw` is echoed back in replies exactly as the user typed it
    Remove { raw: &'a str, position: usize },
    ClearAll,
    Edit {
        raw: &'a str,
        position: usize,
        text: String,
    },
    UnknownEdit,
    Add(String),
    /// Empty leading token: nothing to do
    Ignore,
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Digit strings too large for `usize` can never be a valid position.
fn parse_position(digits: &str) -> usize {
    digits.parse().unwrap_or(usize::MAX)
}

/// Decide which operation `params` asks for. Rules apply in order.
pub fn classify(params: &[String]) -> Action<'_> {
    match params {
        [] => Action::List(Selector::All),
        [only] if is_digits(only) => Action::List(Selector::Position(parse_position(only))),
        [first, rest @ ..] if first == "clear" => match rest {
            [n] if is_digits(n) => Action::Remove {
                raw: n,
                position: parse_position(n),
            },
            _ => Action::ClearAll,
        },
        [first, rest @ ..] if first == "edit" => match rest {
            [n, text @ ..] if is_digits(n) && !text.is_empty() => Action::Edit {
                raw: n,
                position: parse_position(n),
                text: text.join(" "),
            },
            _ => Action::UnknownEdit,
        },
        [first, ..] if !first.is_empty() => Action::Add(params.join(" ")),
        _ => Action::Ignore,
    }
}

pub struct CommandRouter {
    notes: Arc<NoteStore>,
    translator: Arc<dyn Translator>,
}

impl CommandRouter {
    pub fn new(notes: Arc<NoteStore>, translator: Arc<dyn Translator>) -> Self {
        Self { notes, translator }
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Run the operation `params` asks for against `conv_id`.
    pub fn dispatch(&self, conv_id: &str, params: &[String]) -> Result<Outcome, String> {
        let action = classify(params);
        log::debug!("TL;DR: {:?} in conversation {}", action, conv_id);

        let tr = self.translator.as_ref();
        let outcome = match action {
            Action::List(selector) => self.render_listing(conv_id, selector)?,
            Action::Remove { raw, position } => match self.notes.remove(conv_id, position)? {
                Some(removed) => Outcome::reply(tr.render(messages::REMOVED, &[&raw, &removed])),
                None => Outcome::reply(tr.render(messages::POSITION_NOT_FOUND, &[&raw])),
            },
            Action::ClearAll => {
                self.notes.clear(conv_id)?;
                Outcome::reply(tr.render(messages::CLEARED, &[]))
            }
            Action::Edit {
                raw,
                position,
                text,
            } => match self.notes.edit(conv_id, position, &text)? {
                Some(previous) => {
                    Outcome::reply(tr.render(messages::EDITED, &[&raw, &previous, &text]))
                }
                None => Outcome::reply(tr.render(messages::POSITION_NOT_FOUND, &[&raw])),
            },
            Action::UnknownEdit => Outcome::reply(tr.render(messages::UNKNOWN_EDIT, &[])),
            Action::Add(text) => {
                let count = self.notes.add(conv_id, &text)?;
                Outcome::reply(tr.render(messages::ADDED, &[&text, &count]))
            }
            Action::Ignore => {
                // Matches nothing: flush and stay silent.
                self.notes.save()?;
                Outcome {
                    message: None,
                    display: DisplayMode::None,
                }
            }
        };
        Ok(outcome)
    }

    fn render_listing(&self, conv_id: &str, selector: Selector) -> Result<Outcome, String> {
        let tr = self.translator.as_ref();
        let listed = self.notes.list(conv_id, selector)?;

        if listed.is_empty() {
            return Ok(Outcome::reply(tr.render(messages::NOT_FOUND, &[])));
        }

        let mut lines: Vec<String> = listed
            .iter()
            .map(|n| tr.render(messages::LIST_LINE, &[&n.position, &n.text, &n.age]))
            .collect();

        let display = match selector {
            Selector::All => {
                lines.insert(0, tr.render(messages::LIST_HEADER, &[&listed.len()]));
                DisplayMode::All
            }
            Selector::Position(p) => DisplayMode::Single(p),
        };

        Ok(Outcome {
            message: Some(lines.join("\n")),
            display,
        })
    }
}
