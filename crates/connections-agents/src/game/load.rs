//! Loading boards from the community answer archive.
//!
//! The archive is a JSON array of games:
//!
//! ```json
//! [{ "id": 1, "date": "2023-06-12",
//!    "answers": [{ "level": 0, "group": "WET WEATHER",
//!                  "members": ["HAIL", "RAIN", "SLEET", "SNOW"] }, ...] }]
//! ```
//!
//! A flat array of categories is also accepted and is cut into consecutive
//! boards of four categories.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{Board, BoardError, Category, DEFAULT_GROUP_SIZE, DEFAULT_MAX_STRIKES};

/// Public archive of past puzzles.
pub const DEFAULT_ARCHIVE_URL: &str =
    "https://raw.githubusercontent.com/Eyefyre/NYT-Connections-Answers/refs/heads/main/connections.json";

/// Categories per board when chunking a flat category list.
const CATEGORIES_PER_BOARD: usize = 4;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch '{url}': {message}")]
    Http { url: String, message: String },
    #[error("failed to parse game data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One archived game.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedGame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub date: Option<String>,
    pub answers: Vec<Category>,
}

impl ArchivedGame {
    /// Label used in logs and result records.
    pub fn label(&self, fallback_index: usize) -> String {
        match (&self.id, &self.date) {
            (Some(id), Some(date)) => format!("#{id} ({date})"),
            (Some(id), None) => format!("#{id}"),
            (None, Some(date)) => date.clone(),
            (None, None) => format!("game-{fallback_index}"),
        }
    }

    pub fn to_board(&self, group_size: usize, max_strikes: u32) -> Result<Board, BoardError> {
        Board::new(self.answers.clone(), group_size, max_strikes)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GameFile {
    Archive(Vec<ArchivedGame>),
    Categories(Vec<Category>),
}

/// Parse archive JSON (either layout).
pub fn parse_games(json: &str) -> Result<Vec<ArchivedGame>, LoadError> {
    let games = match serde_json::from_str::<GameFile>(json)? {
        GameFile::Archive(games) => games,
        GameFile::Categories(categories) => categories
            .chunks(CATEGORIES_PER_BOARD)
            .map(|chunk| ArchivedGame {
                id: None,
                date: None,
                answers: chunk.to_vec(),
            })
            .collect(),
    };
    debug!("Parsed {} game(s)", games.len());
    Ok(games)
}

/// Load games from a local path or an `http(s)://` URL.
pub async fn load_games(source: &str) -> Result<Vec<ArchivedGame>, LoadError> {
    let body = if source.starts_with("http://") || source.starts_with("https://") {
        info!("Fetching game archive from {source}");
        fetch(source).await?
    } else {
        std::fs::read_to_string(Path::new(source)).map_err(|e| LoadError::Io {
            path: source.to_string(),
            source: e,
        })?
    };
    parse_games(&body)
}

async fn fetch(url: &str) -> Result<String, LoadError> {
    let http_err = |message: String| LoadError::Http {
        url: url.to_string(),
        message,
    };
    let resp = reqwest::get(url)
        .await
        .map_err(|e| http_err(format!("request failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(http_err(format!("HTTP {status}")));
    }
    resp.text()
        .await
        .map_err(|e| http_err(format!("failed to read body: {e}")))
}

/// The built-in reference board.
pub fn sample_board() -> Board {
    let categories = vec![
        Category::new(0, "WET WEATHER", &["HAIL", "RAIN", "SLEET", "SNOW"]),
        Category::new(1, "NBA TEAMS", &["BUCKS", "HEAT", "JAZZ", "NETS"]),
        Category::new(2, "KEYBOARD KEYS", &["OPTION", "RETURN", "SHIFT", "TAB"]),
        Category::new(3, "PALINDROMES", &["KAYAK", "LEVEL", "MOM", "RACECAR"]),
    ];
    match Board::new(categories, DEFAULT_GROUP_SIZE, DEFAULT_MAX_STRIKES) {
        Ok(board) => board,
        Err(e) => unreachable!("built-in board is valid: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_archive_layout() {
        let json = r#"[
            {"id": 1, "date": "2023-06-12", "answers": [
                {"level": 0, "group": "WET WEATHER", "members": ["HAIL", "RAIN", "SLEET", "SNOW"]},
                {"level": 1, "group": "NBA TEAMS", "members": ["BUCKS", "HEAT", "JAZZ", "NETS"]}
            ]}
        ]"#;
        let games = parse_games(json).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].label(0), "#1 (2023-06-12)");
        assert_eq!(games[0].answers[1].group, "NBA TEAMS");
        assert!(games[0].to_board(4, 4).is_ok());
    }

    #[test]
    fn flat_category_list_is_chunked_into_boards() {
        let category = |i: usize| {
            format!(
                r#"{{"level": {}, "group": "G{i}", "members": ["A{i}", "B{i}", "C{i}", "D{i}"]}}"#,
                i % 4
            )
        };
        let items: Vec<String> = (0..8).map(category).collect();
        let json = format!("[{}]", items.join(","));

        let games = parse_games(&json).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].answers[0].group, "G4");
        assert_eq!(games[1].label(1), "game-1");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_games("{not json"), Err(LoadError::Parse(_))));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        std::fs::write(
            &path,
            r#"[{"answers": [{"level": 0, "group": "X", "members": ["A", "B", "C", "D"]}]}]"#,
        )
        .unwrap();

        let games = load_games(path.to_str().unwrap()).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, None);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = load_games("/nonexistent/games.json").await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn sample_board_has_sixteen_words() {
        let board = sample_board();
        assert_eq!(board.all_words().len(), 16);
        assert_eq!(board.categories().len(), 4);
    }
}
