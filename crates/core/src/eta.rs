//! Strict parser for delivery ETA input.
//!
//! Exactly three shapes are accepted: `YYYY-MM-DD HH:MM`, `DD.MM.YYYY HH:MM`
//! and `DD.MM HH:MM` (year defaults to the current local year). Anything else
//! is rejected so the conversation can re-prompt instead of guessing.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaMoment {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

pub fn parse_eta(text: &str) -> Option<EtaMoment> {
    parse_eta_with_year(text, Local::now().year())
}

/// Same as [`parse_eta`] with an explicit default year for the `DD.MM HH:MM`
/// shape.
pub fn parse_eta_with_year(text: &str, default_year: i32) -> Option<EtaMoment> {
    let mut fields = text.split_whitespace();
    let date_part = fields.next()?;
    let time_part = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    let (hour, minute) = parse_time(time_part)?;
    let (year, month, day) = parse_date(date_part, default_year)?;

    // Reject shapes that scan but name an impossible moment.
    NaiveDate::from_ymd_opt(year, month, day)?;
    if hour >= 24 || minute >= 60 {
        return None;
    }

    Some(EtaMoment { year, month, day, hour, minute })
}

fn parse_time(text: &str) -> Option<(u32, u32)> {
    let (hour, minute) = text.split_once(':')?;
    Some((fixed_digits(hour, 2)?, fixed_digits(minute, 2)?))
}

fn parse_date(text: &str, default_year: i32) -> Option<(i32, u32, u32)> {
    if text.contains('-') {
        let mut segments = text.split('-');
        let year = fixed_digits(segments.next()?, 4)?;
        let month = fixed_digits(segments.next()?, 2)?;
        let day = fixed_digits(segments.next()?, 2)?;
        if segments.next().is_some() {
            return None;
        }
        return Some((year as i32, month, day));
    }

    let segments: Vec<&str> = text.split('.').collect();
    match segments.as_slice() {
        [day, month, year] => {
            Some((fixed_digits(year, 4)? as i32, fixed_digits(month, 2)?, fixed_digits(day, 2)?))
        }
        [day, month] => Some((default_year, fixed_digits(month, 2)?, fixed_digits(day, 2)?)),
        _ => None,
    }
}

fn fixed_digits(text: &str, width: usize) -> Option<u32> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
