//! Chat command lookup.
//!
//! Viewers trigger commands by typing short words in chat. Text is
//! normalized (lowercased, punctuation removed, whitespace collapsed) and
//! looked up in a static alias table.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::module::{Module, NotificationHandler};
use crate::stream::dispatch::HandlerError;
use crate::stream::events::TopicEvent;
use crate::stream::proto::Envelope;

/// Lowercases `text`, strips ASCII punctuation and collapses whitespace.
pub fn normalize_chat_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !c.is_ascii_punctuation())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Static alias table from normalized chat text to a command.
#[derive(Debug)]
pub struct CommandTable<C: 'static> {
    entries: &'static [(&'static str, C)],
}

impl<C: Copy + PartialEq> CommandTable<C> {
    /// Aliases must already be normalized.
    pub const fn new(entries: &'static [(&'static str, C)]) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, text: &str) -> Option<C> {
        let normalized = normalize_chat_text(text);
        self.entries
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, command)| *command)
    }

    pub fn aliases(&self, command: C) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .filter(move |(_, candidate)| *candidate == command)
            .map(|(alias, _)| *alias)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundCommand {
    Meow,
    Bonk,
}

pub static SOUND_COMMANDS: CommandTable<SoundCommand> = CommandTable::new(&[
    ("meow", SoundCommand::Meow),
    ("myar", SoundCommand::Meow),
    ("mrow", SoundCommand::Meow),
    ("mrowr", SoundCommand::Meow),
    ("bonk", SoundCommand::Bonk),
    ("bap", SoundCommand::Bonk),
]);

/// A command recognized in a chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatCommand<C> {
    pub chatter: String,
    pub command: C,
}

/// Module turning chat messages into commands on a channel.
///
/// The same command twice in a row is reported once.
pub struct ChatCommandModule<C: 'static> {
    name: String,
    table: &'static CommandTable<C>,
    last: Mutex<Option<C>>,
    commands: mpsc::UnboundedSender<ChatCommand<C>>,
}

impl<C> ChatCommandModule<C>
where
    C: Copy + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        table: &'static CommandTable<C>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ChatCommand<C>>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let module = Arc::new(Self {
            name: name.into(),
            table,
            last: Mutex::new(None),
            commands,
        });
        (module, rx)
    }

    fn on_chat(&self, chatter: &str, text: &str) -> Result<(), HandlerError> {
        let Some(command) = self.table.lookup(text) else {
            return Ok(());
        };

        let mut last = self.last.lock().map_err(|_| "command state poisoned")?;
        if *last == Some(command) {
            debug!(event = "command_repeated", module = %self.name, ?command);
            return Ok(());
        }
        *last = Some(command);

        self.commands
            .send(ChatCommand {
                chatter: chatter.to_string(),
                command,
            })
            .map_err(|_| "command receiver dropped".into())
    }
}

#[async_trait]
impl<C> NotificationHandler for ChatCommandModule<C>
where
    C: Copy + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    async fn handle_notification(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let Some(subscription) = envelope.as_subscription() else {
            return Ok(());
        };
        match subscription.event()? {
            TopicEvent::ChatMessage(event) => {
                self.on_chat(&event.chatter_user_name, &event.message.text)
            }
            _ => Ok(()),
        }
    }
}

impl<C> Module for ChatCommandModule<C>
where
    C: Copy + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn notifications(self: Arc<Self>) -> Option<Arc<dyn NotificationHandler>> {
        Some(self)
    }
}
