use rickdex_schema::{Character, EpisodeSummary};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ShowOutput<'a> {
    pub character: &'a Character,
    pub episodes: &'a [EpisodeSummary],
}

/// Plain-text rendering of a character and its episode list.
pub fn format_card(character: &Character, episodes: &[EpisodeSummary]) -> String {
    let mut rows = vec![
        ("STATUS", character.status.as_str()),
        ("SPECIES", character.species.as_str()),
    ];
    if !character.kind.is_empty() {
        rows.push(("TYPE", character.kind.as_str()));
    }
    rows.extend([
        ("GENDER", character.gender.as_str()),
        ("ORIGIN", character.origin.name.as_str()),
        ("LOCATION", character.location.name.as_str()),
    ]);

    let mut out = format!("{}\n{}\n", character.name, "-".repeat(40));
    for (label, value) in rows {
        out.push_str(&format!("{:<10} {value}\n", format!("{label}:")));
    }
    out.push_str(&format!(
        "{:<10} {}\n",
        "CREATED:",
        character.created_label()
    ));
    out.push_str(&format!("{:<10} {}\n", "IMAGE:", character.image));

    out.push_str(&format!("\nEpisodes ({}):\n", episodes.len()));
    if episodes.is_empty() && !character.episode.is_empty() {
        out.push_str("  (episode list unavailable)\n");
    }
    for episode in episodes {
        out.push_str(&format!("  {episode}\n"));
    }
    out
}
