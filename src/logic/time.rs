// Time-related operations.
use rand::{seq::IndexedRandom, Rng};
use time::{format_description::BorrowedFormatItem, macros::format_description, Date, Duration};

// Use this format for formatting and parsing dates.
static ISO_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

// JSON serialisation and deserialisation for ISO dates.
pub mod iso_date_format {
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        let s = date.format(super::ISO_FORMAT).map_err(ser::Error::custom)?;
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Date::parse(s.as_str(), super::ISO_FORMAT).map_err(de::Error::custom)
    }
}

// Parse an ISO date.
pub fn string_to_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s, ISO_FORMAT)
}

// Get all dates between the two dates, inclusive.
pub fn dates_between(start: Date, end: Date) -> Vec<Date> {
    let mut dates = Vec::new();
    let mut date = start;
    while date <= end {
        dates.push(date);
        date = match date.next_day() {
            Some(d) => d,
            None => break,
        };
    }
    return dates;
}

// Check whether a date falls on one of the given weekdays (1 = Monday, 7 = Sunday).
// An empty list allows every day.
pub fn is_valid_weekday(date: Date, weekdays: &[u8]) -> bool {
    weekdays.is_empty() || weekdays.contains(&date.weekday().number_from_monday())
}

// Pick a random valid date among the days after `today`, from `first_day` to `last_day` (inclusive).
// Falls back to the last day of the window if none of the days is valid.
pub fn random_date_in_window<R: Rng + ?Sized>(rng: &mut R, today: Date, first_day: i64, last_day: i64, weekdays: &[u8]) -> Date {
    let start = today.saturating_add(Duration::days(first_day));
    let end = today.saturating_add(Duration::days(last_day));
    let candidates: Vec<Date> = dates_between(start, end).into_iter()
        .filter(|d| is_valid_weekday(*d, weekdays))
        .collect();

    match candidates.choose(rng) {
        Some(d) => *d,
        None => end,
    }
}

// Pick the date of a matchday in week `week` (1-based) after today.
pub fn matchday_in_week<R: Rng + ?Sized>(rng: &mut R, today: Date, week: u32, weekdays: &[u8]) -> Date {
    let week = i64::from(week.max(1));
    random_date_in_window(rng, today, 7 * (week - 1) + 1, 7 * week, weekdays)
}
