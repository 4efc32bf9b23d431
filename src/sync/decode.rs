//! Sheet rows → typed records.
//!
//! Every function here is total: malformed cells resolve to a fixed
//! sentinel instead of failing, and the same input always yields the same
//! record so diffs stay stable between cycles.

use crate::config::ListLayout;
use crate::database::{CompletedItem, PlanToWatchEntry, RolledEntry, SeasonalEntry};
use crate::sheets::{GridCell, ValueRow};
use crate::sync::status::classify;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Column layout of the Completed range
const COMPLETED_WIDTH: usize = 10;
const COL_ID: usize = 0;
const COL_TITLE: usize = 1;
const COL_TYPE: usize = 2;
const COL_EPISODE: usize = 3;
const COL_RATING1: usize = 4;
const COL_START: usize = 7;
const COL_END: usize = 8;
const COL_NOTES: usize = 9;

/// Stand-in for a missing or non-numeric episode part before coercion
pub const EPISODE_UNPARSED: i32 = -1;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];
const SHORT_YEAR_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

fn rating_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d\.\d)|(\d+)").expect("rating pattern is valid"))
}

/// Text of a raw cell; numbers and booleans are rendered, null is absent.
pub fn cell_text(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        other => Some(other.to_string()),
    }
}

/// Leading integer of `s`, ignoring leading whitespace and anything after
/// the digits (`" 12 eps"` → 12).
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Split `"A/B"` into its two parts. A part that is missing is
/// [`EPISODE_UNPARSED`]; a part that is present but not numeric is `None`.
pub fn parse_episode_spec(raw: &str) -> (Option<i32>, Option<i32>) {
    let mut parts = raw.split('/');
    let mut part = || match parts.next() {
        Some(p) if !p.is_empty() => parse_leading_int(p).and_then(|n| i32::try_from(n).ok()),
        _ => Some(EPISODE_UNPARSED),
    };
    let actual = part();
    let total = part();
    (actual, total)
}

/// Stored episode number: zero, the unparsed sentinel and non-numeric parts
/// all collapse to 0.
pub fn coerce_episode(part: Option<i32>) -> i32 {
    match part {
        Some(n) if n != 0 && n != EPISODE_UNPARSED => n,
        _ => 0,
    }
}

/// `(episode_actual, episode_total)` as stored
pub fn parse_episode(raw: &str) -> (i32, i32) {
    let (actual, total) = parse_episode_spec(raw);
    (coerce_episode(actual), coerce_episode(total))
}

/// `"TV + OVA"` → `["TV", "OVA"]`. A blank cell has no tags.
pub fn parse_type_tags(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split('+')
        .map(|segment| segment.chars().filter(|c| !c.is_whitespace()).collect())
        .collect()
}

/// Average of the numbers embedded in a rating cell.
///
/// No number → 0, one → itself, two → their mean. Only the first two
/// numbers are considered when a cell holds more.
pub fn rating_average(raw: &str) -> f64 {
    let numbers: Vec<f64> = rating_pattern()
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .take(2)
        .collect();
    match numbers.as_slice() {
        [] => 0.0,
        [only] => *only,
        [first, second, ..] => (first + second) / 2.0,
    }
}

/// Parse a sheet date; `None` marks an empty or unparseable cell.
/// Date-only values are taken as midnight UTC. Results are truncated to
/// whole milliseconds, the precision the store keeps.
pub fn parse_sheet_date(raw: &str) -> Option<DateTime<Utc>> {
    let dt = parse_sheet_datetime(raw)?;
    Utc.timestamp_millis_opt(dt.timestamp_millis()).single()
}

fn parse_sheet_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    let date = DATE_FORMATS
        .iter()
        .filter_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .find(|d| d.year_ce().1 >= 100)
        .or_else(|| {
            SHORT_YEAR_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        })?;

    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Decode one row of the Completed range.
///
/// Short rows are padded with empty cells. Returns `None` only when the id
/// cell holds no integer, since such a row has no identity to sync under.
pub fn decode_completed_row(row: &[Value]) -> Option<CompletedItem> {
    let mut cells: Vec<String> = (0..COMPLETED_WIDTH)
        .map(|i| cell_text(row.get(i)).unwrap_or_default())
        .collect();

    let id = parse_leading_int(&cells[COL_ID])?;
    let (episode_actual, episode_total) = parse_episode(&cells[COL_EPISODE]);
    let type_tags = parse_type_tags(&cells[COL_TYPE]);
    let start_at = parse_sheet_date(&cells[COL_START]);
    let end_at = parse_sheet_date(&cells[COL_END]);
    let averages: Vec<f64> = cells[COL_RATING1..COL_RATING1 + 3]
        .iter()
        .map(|r| rating_average(r))
        .collect();

    let mut take = |i: usize| std::mem::take(&mut cells[i]);
    Some(CompletedItem {
        id,
        title: take(COL_TITLE),
        kind: take(COL_TYPE),
        type_tags,
        episode: take(COL_EPISODE),
        episode_actual,
        episode_total,
        rating1: take(COL_RATING1),
        rating2: take(COL_RATING1 + 1),
        rating3: take(COL_RATING1 + 2),
        rating1_average: averages[0],
        rating2_average: averages[1],
        rating3_average: averages[2],
        start: take(COL_START),
        start_at,
        end: take(COL_END),
        end_at,
        notes: take(COL_NOTES),
    })
}

pub fn decode_completed(rows: &[ValueRow]) -> Vec<CompletedItem> {
    let items: Vec<CompletedItem> = rows
        .iter()
        .filter_map(|row| decode_completed_row(row))
        .collect();
    let skipped = rows.len() - items.len();
    if skipped > 0 {
        log::debug!("Skipped {} completed rows without a numeric id", skipped);
    }
    items
}

/// The five lists decoded from one grid read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTables {
    pub casual: Vec<PlanToWatchEntry>,
    pub non_casual: Vec<PlanToWatchEntry>,
    pub movies: Vec<PlanToWatchEntry>,
    pub rolled: Vec<RolledEntry>,
    pub seasonal: Vec<SeasonalEntry>,
}

fn cell_at(grid: &[Vec<GridCell>], row: usize, column: usize) -> Option<&GridCell> {
    grid.get(row).and_then(|r| r.get(column))
}

/// Split the lists grid into its regions. Ids are row offsets within each
/// region, so moving a title to another row changes its identity.
pub fn decode_lists(grid: &[Vec<GridCell>], layout: &ListLayout) -> ListTables {
    let plan_to_watch = |region: &crate::config::ListRegion| -> Vec<PlanToWatchEntry> {
        region
            .rows()
            .filter_map(|row| {
                let title = cell_at(grid, row, region.column)?.text()?;
                Some(PlanToWatchEntry {
                    id: (row - region.start) as i64,
                    title: title.to_string(),
                })
            })
            .collect()
    };

    let rolled = layout
        .rolled
        .rows()
        .filter_map(|row| {
            let cell = cell_at(grid, row, layout.rolled.column)?;
            let title = cell.text()?;
            Some(RolledEntry {
                id: (row - layout.rolled.start) as i64,
                title: title.to_string(),
                status: classify(cell.background.as_ref()),
            })
        })
        .collect();

    let s = &layout.seasonal;
    let seasonal = (s.start..s.end)
        .filter_map(|row| {
            let title = cell_at(grid, row, s.title_column)?.text()?;
            let status_color = cell_at(grid, row, s.status_column).and_then(|c| c.background.as_ref());
            Some(SeasonalEntry {
                title: title.to_string(),
                status: classify(status_color),
                order: row as i64,
            })
        })
        .collect();

    ListTables {
        casual: plan_to_watch(&layout.casual),
        non_casual: plan_to_watch(&layout.non_casual),
        movies: plan_to_watch(&layout.movies),
        rolled,
        seasonal,
    }
}
