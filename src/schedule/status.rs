use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Spellings meaning "no game", compared after [`normalize_status`].
const NO_GAME_SPELLINGS: &[&str] = &["nogame", "nojuego", "sinjuego", "nohayjuego"];

/// Status of a schedule cell.
///
/// Statuses are free text on the wire; only "game" and the "no game" family carry meaning for
/// numbering. Anything else is kept verbatim and still counts as a playable game.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GameStatus {
    /// Regular game (`"game"`, also the default for blank input).
    #[default]
    Game,
    /// Placeholder cell without a game (`"no_game"`, `"No Game"`, `"no-game"`, ...).
    NoGame,
    /// Any other status, trimmed but otherwise untouched.
    Other(String),
}

impl GameStatus {
    /// Classify a raw status string.
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_status(raw);
        if normalized.is_empty() || normalized == "game" {
            GameStatus::Game
        } else if NO_GAME_SPELLINGS.contains(&normalized.as_str()) {
            GameStatus::NoGame
        } else {
            GameStatus::Other(raw.trim().to_owned())
        }
    }

    /// Canonical wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            GameStatus::Game => "game",
            GameStatus::NoGame => "no_game",
            GameStatus::Other(raw) => raw,
        }
    }

    /// True for every recognised "no game" spelling.
    pub fn is_no_game(&self) -> bool {
        matches!(self, GameStatus::NoGame)
    }
}

/// Lower-case and drop everything that is not a letter or digit.
fn normalize_status(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl From<&str> for GameStatus {
    fn from(value: &str) -> Self {
        GameStatus::parse(value)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GameStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GameStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(GameStatus::parse).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_no_game_variants() {
        for raw in ["no_game", "No Game", "NO-GAME", " nogame ", "no.game", "No juego", "sin-juego"] {
            assert_eq!(GameStatus::parse(raw), GameStatus::NoGame, "{raw}");
        }
    }

    #[test]
    fn blank_status_defaults_to_game() {
        assert_eq!(GameStatus::parse(""), GameStatus::Game);
        assert_eq!(GameStatus::parse("  GAME "), GameStatus::Game);
    }

    #[test]
    fn other_statuses_are_kept_trimmed() {
        assert_eq!(
            GameStatus::parse("  Suspendido "),
            GameStatus::Other("Suspendido".into())
        );
        assert!(!GameStatus::parse("rain delay").is_no_game());
    }

    #[test]
    fn serializes_canonical_names() {
        let encoded = serde_json::to_string(&GameStatus::parse("No-Game")).unwrap();
        assert_eq!(encoded, "\"no_game\"");
        let decoded: GameStatus = serde_json::from_str("null").unwrap();
        assert_eq!(decoded, GameStatus::Game);
    }
}
