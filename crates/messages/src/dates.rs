//! Date and time rewriting inside message text.

use {
    bpi_protocol::Message,
    chrono::{Datelike, NaiveDate, NaiveDateTime},
    once_cell::sync::Lazy,
    regex::Regex,
    tracing::{debug, info, warn},
};

use crate::matcher::Substitution;

/// Output format of [`reformat_date`].
pub const DATE_FORMAT: &str = "%d.%m.%Y";

const ISO_DATETIME: &str = r"\d{4}.*T\d\d:\d\d:\d\d";
const CLOCK_TIME: &str = r"\d\d:\d\d:\d\d";
const DAY_MONTH_YEAR: &str = r"\d\d\D\d\d\D\d\d\d\d";

static ISO_DATETIME_SUB: Lazy<Option<Substitution>> = Lazy::new(|| Substitution::new(ISO_DATETIME));
static CLOCK_TIME_SUB: Lazy<Option<Substitution>> = Lazy::new(|| Substitution::new(CLOCK_TIME));
static DAY_MONTH_YEAR_SUB: Lazy<Option<Substitution>> =
    Lazy::new(|| Substitution::new(DAY_MONTH_YEAR));
static DAY_MONTH_YEAR_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(DAY_MONTH_YEAR).ok());

/// Weekday names prefixed by [`add_weekday`], indexed from Sunday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayNames {
    #[default]
    German,
    English,
}

impl DayNames {
    #[must_use]
    pub fn name(self, days_from_sunday: u32) -> &'static str {
        const GERMAN: [&str; 7] = [
            "Sonntag, ",
            "Montag, ",
            "Dienstag, ",
            "Mittwoch, ",
            "Donnerstag, ",
            "Freitag, ",
            "Samstag, ",
        ];
        const ENGLISH: [&str; 7] = [
            "Sunday, ",
            "Monday, ",
            "Tuesday, ",
            "Wednesday, ",
            "Thursday, ",
            "Friday, ",
            "Saturday, ",
        ];
        let table = match self {
            Self::German => &GERMAN,
            Self::English => &ENGLISH,
        };
        table[(days_from_sunday % 7) as usize]
    }
}

/// Rewrite ISO timestamps (`2024-05-03T14:30:00`) as `03.05.2024`.
///
/// A match that is not a valid timestamp stops the rewrite for that text.
#[must_use]
pub fn reformat_date(message: &Message) -> Message {
    let Some(sub) = ISO_DATETIME_SUB.as_ref() else {
        return message.clone();
    };
    message.clone().map_text(|text| {
        sub.apply_text_with(
            text,
            |hit| match NaiveDateTime::parse_from_str(hit, "%Y-%m-%dT%H:%M:%S") {
                Ok(date) => {
                    let formatted = date.format(DATE_FORMAT).to_string();
                    info!(from = hit, to = %formatted, "reformatted date");
                    Some(formatted)
                },
                Err(e) => {
                    warn!(value = hit, error = %e, "not an ISO timestamp, leaving text as is");
                    None
                },
            },
            false,
        )
    })
}

/// Cut clock times from `HH:MM:SS` to `HH:MM`.
#[must_use]
pub fn strip_seconds(message: &Message) -> Message {
    let Some(sub) = CLOCK_TIME_SUB.as_ref() else {
        return message.clone();
    };
    message.clone().map_text(|text| {
        sub.apply_text_with(
            text,
            |hit| {
                let short = hit.get(..hit.len().saturating_sub(3)).unwrap_or(hit);
                debug!(from = hit, to = short, "stripped seconds");
                Some(short.to_string())
            },
            false,
        )
    })
}

/// Prefix a `DD.MM.YYYY` date with its weekday name.
///
/// Only one date per text is handled, the last one.
#[must_use]
pub fn add_weekday(message: &Message, days: DayNames) -> Message {
    let (Some(sub), Some(re)) = (DAY_MONTH_YEAR_SUB.as_ref(), DAY_MONTH_YEAR_RE.as_ref()) else {
        return message.clone();
    };
    message.clone().map_text(|text| {
        if re.find_iter(text).count() > 1 {
            debug!("several dates in one text, only the last gets a weekday");
        }
        sub.apply_text_with(
            text,
            |hit| match parse_day_month_year(hit) {
                Some(date) => {
                    let day = days.name(date.weekday().num_days_from_sunday());
                    Some(format!("{day}{hit}"))
                },
                None => {
                    warn!(value = hit, "not a calendar date, leaving text as is");
                    None
                },
            },
            true,
        )
    })
}

/// Parse `DD?MM?YYYY` with any single separator characters.
fn parse_day_month_year(value: &str) -> Option<NaiveDate> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    let day = digits.get(0..2)?.parse().ok()?;
    let month = digits.get(2..4)?.parse().ok()?;
    let year = digits.get(4..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
