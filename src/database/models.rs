use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow stage of a list entry, decoded from a cell's background colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Watched")]
    Watched,
    #[serde(rename = "Not loaded")]
    NotLoaded,
    #[serde(rename = "Loaded")]
    Loaded,
    #[serde(rename = "Not aired")]
    NotAired,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Default for Status {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watched => "Watched",
            Self::NotLoaded => "Not loaded",
            Self::Loaded => "Loaded",
            Self::NotAired => "Not aired",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "watched" => Self::Watched,
            "not loaded" | "not_loaded" | "notloaded" => Self::NotLoaded,
            "loaded" => Self::Loaded,
            "not aired" | "not_aired" | "notaired" => Self::NotAired,
            _ => Self::Unknown,
        }
    }
}

/// The six logical tables mirrored from the sheet.
///
/// `as_str` is also the event name broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableName {
    Completed,
    #[serde(rename = "PTWCasual")]
    PtwCasual,
    #[serde(rename = "PTWNonCasual")]
    PtwNonCasual,
    #[serde(rename = "PTWMovies")]
    PtwMovies,
    #[serde(rename = "PTWRolled")]
    PtwRolled,
    Seasonal,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Completed,
        TableName::PtwCasual,
        TableName::PtwNonCasual,
        TableName::PtwMovies,
        TableName::PtwRolled,
        TableName::Seasonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::PtwCasual => "PTWCasual",
            Self::PtwNonCasual => "PTWNonCasual",
            Self::PtwMovies => "PTWMovies",
            Self::PtwRolled => "PTWRolled",
            Self::Seasonal => "Seasonal",
        }
    }

    /// SQLite table backing this logical table
    pub fn sql_table(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PtwCasual => "ptw_casual",
            Self::PtwNonCasual => "ptw_non_casual",
            Self::PtwMovies => "ptw_movies",
            Self::PtwRolled => "ptw_rolled",
            Self::Seasonal => "seasonal",
        }
    }

    /// Column used for the stable find-all ordering
    pub fn sort_column(&self) -> &'static str {
        match self {
            Self::Seasonal => "sort_order",
            _ => "id",
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "completed" => Ok(Self::Completed),
            "ptwcasual" | "casual" => Ok(Self::PtwCasual),
            "ptwnoncasual" | "noncasual" => Ok(Self::PtwNonCasual),
            "ptwmovies" | "movies" => Ok(Self::PtwMovies),
            "ptwrolled" | "rolled" => Ok(Self::PtwRolled),
            "seasonal" => Ok(Self::Seasonal),
            _ => Err(format!("Unknown table: {}", s)),
        }
    }
}

/// One row of the Completed table.
///
/// Raw strings are kept next to their derived values so the record can be
/// regenerated from the sheet alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedItem {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_tags: Vec<String>,
    pub episode: String,
    pub episode_actual: i32,
    pub episode_total: i32,
    pub rating1: String,
    pub rating2: String,
    pub rating3: String,
    pub rating1_average: f64,
    pub rating2_average: f64,
    pub rating3_average: f64,
    pub start: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end: String,
    pub end_at: Option<DateTime<Utc>>,
    pub notes: String,
}

/// Plan-to-watch entry; the same shape backs the Casual, NonCasual and
/// Movies lists. `id` is the row offset inside the list's sheet region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanToWatchEntry {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolledEntry {
    pub id: i64,
    pub title: String,
    pub status: Status,
}

/// Identified by `title`; `order` only records the row it sits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalEntry {
    pub title: String,
    pub status: Status,
    pub order: i64,
}
