use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric key of a character record.
///
/// Navigation is plain arithmetic with no lower or upper clamp: the API
/// answers out-of-range ids with 404, which the loader reports as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(i64);

impl CharacterId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn previous(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CharacterId {
    type Err = ParseIntError;

    /// Reads the leading integer of the trimmed text, so `"4.2"` and
    /// `"12abc"` both yield their integer prefix. Text without leading
    /// digits is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let sign = usize::from(s.starts_with(&['+', '-'][..]));
        let digits = s[sign..].bytes().take_while(u8::is_ascii_digit).count();
        s[..sign + digits].parse::<i64>().map(Self)
    }
}

impl From<i64> for CharacterId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Name + resource link pair used for a character's origin and last location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRef {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    #[serde(default)]
    pub id: Option<CharacterId>,
    pub name: String,
    pub status: String,
    pub species: String,
    /// Sub-species or variant, often empty.
    #[serde(rename = "type", default)]
    pub kind: String,
    pub gender: String,
    pub origin: PlaceRef,
    pub location: PlaceRef,
    pub image: String,
    /// Episode resource URLs, in the order the API lists them.
    pub episode: Vec<String>,
    #[serde(default)]
    pub url: String,
    /// Creation timestamp as the API sent it; see [`Character::created_at`].
    #[serde(default)]
    pub created: String,
}

impl Character {
    pub fn episode_refs(&self) -> &[String] {
        &self.episode
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Display form of `created`; falls back to the raw text when it is not RFC 3339.
    pub fn created_label(&self) -> String {
        match self.created_at() {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => self.created.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub air_date: Option<String>,
    /// Season/episode code such as `S01E01`.
    #[serde(rename = "episode", default)]
    pub code: Option<String>,
}

/// The projection of an episode shown next to a character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub number: i64,
    pub name: String,
}

impl From<Episode> for EpisodeSummary {
    fn from(episode: Episode) -> Self {
        Self {
            number: episode.id,
            name: episode.name,
        }
    }
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Episode {}: {}", self.number, self.name)
    }
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Notice {
    CharacterNotFound { id: CharacterId },
    InvalidIdentifier { input: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CharacterNotFound { id } => write!(f, "Character not found! (id {id})"),
            Notice::InvalidIdentifier { input } => {
                write!(f, "Invalid character ID: {input:?}")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    IdentifierChanged {
        id: CharacterId,
    },
    CharacterLoaded {
        id: CharacterId,
        name: String,
        episode_count: usize,
    },
    CharacterMissing {
        id: CharacterId,
    },
    EpisodesResolved {
        character: CharacterId,
        count: usize,
    },
    EpisodesFailed {
        character: CharacterId,
        error: String,
    },
    NoticeRaised {
        notice: Notice,
        at: DateTime<Utc>,
    },
}
