use crate::feed::{CommandSpec, InboundMessage};

pub const START: &str = "/start";
pub const RANDOM: &str = "/random";
pub const MEANING: &str = "/meaning";
pub const MEANING_WITH_EXAMPLE: &str = "/meaning_with_example";

/// Commands advertised to chat clients, in menu order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        trigger: START,
        description: "Starts the bot",
    },
    CommandSpec {
        trigger: RANDOM,
        description: "Gives you random word to answer",
    },
    CommandSpec {
        trigger: MEANING,
        description: "find meaning of a word /meaning <word>",
    },
    CommandSpec {
        trigger: MEANING_WITH_EXAMPLE,
        description: "gives an example for a word /meaning_with_example <word>",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Random,
    /// Full message text; the handler parses out the word.
    Lookup { text: String },
    Insert {
        caption: String,
        attachment_ref: String,
    },
    Skip,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Random => "random",
            Self::Lookup { .. } => "lookup",
            Self::Insert { .. } => "insert",
            Self::Skip => "skip",
        }
    }
}

/// Decide what to do with a message.
///
/// Start and random must match exactly. Any text containing `/meaning`
/// (which also covers `/meaning_with_example`) is a lookup. Anything else
/// that carries an attachment is an insert; the rest is skipped.
pub fn classify(message: &InboundMessage) -> Command {
    let text = message.text.as_deref().unwrap_or_default().trim();

    if text == START {
        return Command::Start;
    }
    if text == RANDOM {
        return Command::Random;
    }
    if text.contains(MEANING) {
        return Command::Lookup {
            text: text.to_string(),
        };
    }

    match &message.attachment_ref {
        Some(attachment_ref) => Command::Insert {
            caption: message.caption.clone().unwrap_or_default(),
            attachment_ref: attachment_ref.clone(),
        },
        None => Command::Skip,
    }
}
