use chrono::Utc;
use rickdex_schema::{BusMessage, Character, CharacterId, EpisodeSummary, Notice};
use serde::Serialize;

use crate::error::{parse_identifier, CharacterError, ResolutionError};

/// Tag attached to an in-flight fetch. A completion is applied only while its
/// ticket is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    fn bump(&mut self) -> Ticket {
        self.0 += 1;
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Previous,
    Next,
    Reload,
}

/// Everything that can change the browser state.
#[derive(Debug, Clone)]
pub enum Input {
    Command(Command),
    CharacterFetched {
        ticket: Ticket,
        id: CharacterId,
        result: Result<Character, CharacterError>,
    },
    EpisodesFetched {
        ticket: Ticket,
        result: Result<Vec<EpisodeSummary>, ResolutionError>,
    },
}

impl From<Command> for Input {
    fn from(cmd: Command) -> Self {
        Input::Command(cmd)
    }
}

/// Work the runtime must carry out after a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    Load { ticket: Ticket, id: CharacterId },
    Resolve { ticket: Ticket, refs: Vec<String> },
    Publish(BusMessage),
}

/// Read-only snapshot handed to views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserView {
    pub identifier: CharacterId,
    pub search_text: String,
    pub character: Option<Character>,
    pub episodes: Vec<EpisodeSummary>,
    pub character_status: LoadStatus,
    pub episode_status: LoadStatus,
    pub error: bool,
}

impl BrowserView {
    /// Both pipelines have finished for the current identifier.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.character_status,
            LoadStatus::Loaded | LoadStatus::Failed
        ) && self.episode_status != LoadStatus::Loading
    }
}

/// Identifier → Character → episode summaries, owned by a single writer.
///
/// `apply` is the only mutator. It never performs I/O; it returns the effects
/// to run instead.
#[derive(Debug, Clone)]
pub struct BrowserState {
    identifier: CharacterId,
    search_text: String,
    character: Option<Character>,
    episodes: Vec<EpisodeSummary>,
    character_status: LoadStatus,
    episode_status: LoadStatus,
    error: bool,
    load_ticket: Ticket,
    character_ticket: Ticket,
}

impl BrowserState {
    pub fn new(start: CharacterId) -> Self {
        Self {
            identifier: start,
            search_text: start.to_string(),
            character: None,
            episodes: Vec::new(),
            character_status: LoadStatus::Idle,
            episode_status: LoadStatus::Idle,
            error: false,
            load_ticket: Ticket::default(),
            character_ticket: Ticket::default(),
        }
    }

    /// Effects for the initial load of the start identifier.
    pub fn start(&mut self) -> Vec<Effect> {
        self.set_identifier(self.identifier)
    }

    pub fn identifier(&self) -> CharacterId {
        self.identifier
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn episodes(&self) -> &[EpisodeSummary] {
        &self.episodes
    }

    pub fn view(&self) -> BrowserView {
        BrowserView {
            identifier: self.identifier,
            search_text: self.search_text.clone(),
            character: self.character.clone(),
            episodes: self.episodes.clone(),
            character_status: self.character_status,
            episode_status: self.episode_status,
            error: self.error,
        }
    }

    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Command(cmd) => self.on_command(cmd),
            Input::CharacterFetched { ticket, id, result } => {
                self.on_character_fetched(ticket, id, result)
            }
            Input::EpisodesFetched { ticket, result } => self.on_episodes_fetched(ticket, result),
        }
    }

    fn on_command(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Search(text) => {
                self.search_text = text;
                match parse_identifier(&self.search_text) {
                    Ok(id) => self.set_identifier(id),
                    Err(e) => {
                        tracing::info!(error = %e, "search rejected");
                        vec![notice(Notice::InvalidIdentifier {
                            input: self.search_text.clone(),
                        })]
                    }
                }
            }
            Command::Previous => {
                let id = self.identifier.previous();
                self.search_text = id.to_string();
                self.set_identifier(id)
            }
            Command::Next => {
                let id = self.identifier.next();
                self.search_text = id.to_string();
                self.set_identifier(id)
            }
            Command::Reload => self.set_identifier(self.identifier),
        }
    }

    fn set_identifier(&mut self, id: CharacterId) -> Vec<Effect> {
        self.identifier = id;
        self.character_status = LoadStatus::Loading;
        let ticket = self.load_ticket.bump();
        vec![
            Effect::Publish(BusMessage::IdentifierChanged { id }),
            Effect::Load { ticket, id },
        ]
    }

    fn on_character_fetched(
        &mut self,
        ticket: Ticket,
        id: CharacterId,
        result: Result<Character, CharacterError>,
    ) -> Vec<Effect> {
        if ticket != self.load_ticket {
            tracing::debug!(%id, "discarding superseded character result");
            return Vec::new();
        }

        // Any resolution still running belongs to the old character.
        let character_ticket = self.character_ticket.bump();
        self.episodes.clear();

        match result {
            Ok(character) => {
                let refs = character.episode.clone();
                let mut effects = vec![Effect::Publish(BusMessage::CharacterLoaded {
                    id,
                    name: character.name.clone(),
                    episode_count: refs.len(),
                })];

                self.character = Some(character);
                self.character_status = LoadStatus::Loaded;
                self.error = false;
                self.search_text = id.to_string();

                if refs.is_empty() {
                    self.episode_status = LoadStatus::Loaded;
                } else {
                    self.episode_status = LoadStatus::Loading;
                    effects.push(Effect::Resolve {
                        ticket: character_ticket,
                        refs,
                    });
                }
                effects
            }
            Err(e) => {
                tracing::info!(error = %e, "character unavailable");
                self.character = None;
                self.character_status = LoadStatus::Failed;
                self.episode_status = LoadStatus::Idle;
                self.error = true;
                vec![
                    Effect::Publish(BusMessage::CharacterMissing { id }),
                    notice(Notice::CharacterNotFound { id }),
                ]
            }
        }
    }

    fn on_episodes_fetched(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<EpisodeSummary>, ResolutionError>,
    ) -> Vec<Effect> {
        if ticket != self.character_ticket {
            tracing::debug!("discarding episodes resolved for a superseded character");
            return Vec::new();
        }
        let Some(character) = self.character.as_ref() else {
            return Vec::new();
        };
        let character_id = character.id.unwrap_or(self.identifier);

        match result {
            Ok(episodes) => {
                let count = episodes.len();
                self.episodes = episodes;
                self.episode_status = LoadStatus::Loaded;
                vec![Effect::Publish(BusMessage::EpisodesResolved {
                    character: character_id,
                    count,
                })]
            }
            Err(e) => {
                tracing::warn!(error = %e, character = %character_id, "episode list unavailable");
                self.episodes.clear();
                self.episode_status = LoadStatus::Failed;
                vec![Effect::Publish(BusMessage::EpisodesFailed {
                    character: character_id,
                    error: e.to_string(),
                })]
            }
        }
    }
}

fn notice(notice: Notice) -> Effect {
    Effect::Publish(BusMessage::NoticeRaised {
        notice,
        at: Utc::now(),
    })
}
