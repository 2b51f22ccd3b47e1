use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const MINUTES_PER_DAY: i32 = 1440;
pub const DEFAULT_DURATION_MINUTES: u16 = 120;

/// Language a message or label is rendered in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ar,
    En,
}

/// Naive wall-clock time, stored as minutes since midnight (0..=1439).
#[derive(SerializeDisplay, DeserializeFromStr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self(hour * 60 + minute))
    }

    /// Wraps any minute count onto the 24h clock.
    pub fn from_minutes(total: i32) -> Self {
        Self(total.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_time_of_day(i32::from(self.0)))
    }
}

impl FromStr for TimeOfDay {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_time_of_day(s).ok_or(RangeError::Format)
    }
}

/// A single same-day session. `end` is always strictly after `start`.
#[derive(SerializeDisplay, DeserializeFromStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl TimeRange {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError::Order);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

impl FromStr for TimeRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve_range(s, &RangePolicy::default())
    }
}

/// How a bare start time is extended and whether explicit ranges must match
/// the default length exactly (the older, strict rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    pub default_duration_minutes: u16,
    pub require_exact_duration: bool,
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            require_exact_duration: false,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("time is empty")]
    Empty,
    #[error("use HH:MM or HH:MM AM/PM format")]
    Format,
    #[error("write a start time, or a start and an end separated by a dash")]
    Malformed,
    #[error("set the start time first")]
    MissingStart,
    #[error("end time must be after start time")]
    Order,
    #[error("session must last exactly {expected} minutes")]
    DurationMismatch { expected: u16 },
    #[error("session cannot extend into the next day")]
    NextDay,
}

impl RangeError {
    pub fn message(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.to_string(),
            Locale::Ar => match self {
                RangeError::Empty => "الوقت فارغ".into(),
                RangeError::Format => "اكتب الوقت بصيغة HH:MM أو HH:MM AM/PM".into(),
                RangeError::Malformed => "اكتب وقت البداية، أو البداية والنهاية بينهما شرطة".into(),
                RangeError::MissingStart => "حدد وقت البداية أولاً".into(),
                RangeError::Order => "وقت النهاية يجب أن يكون بعد وقت البداية".into(),
                RangeError::DurationMismatch { expected } => {
                    format!("المدة يجب أن تكون {expected} دقيقة بالضبط")
                }
                RangeError::NextDay => "لا يمكن أن يمتد الوقت لليوم التالي".into(),
            },
        }
    }
}

/// Result of shifting a time: the wrapped clock value plus the number of
/// midnights crossed (negative when shifting backwards past 00:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shifted {
    pub time: TimeOfDay,
    pub day_delta: i32,
}

pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            _ => c,
        })
        .collect()
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{061C}' | '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
    )
}

/// Latin digits, no bidi marks, single inner spaces, trimmed.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in normalize_digits(text).chars().filter(|c| !is_bidi_control(*c)) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

const MERIDIEM_MARKERS: [(&str, Meridiem); 4] = [
    ("AM", Meridiem::Am),
    ("PM", Meridiem::Pm),
    ("ص", Meridiem::Am),
    ("م", Meridiem::Pm),
];

fn split_meridiem(text: &str) -> Option<(&str, Meridiem)> {
    MERIDIEM_MARKERS.iter().find_map(|(marker, meridiem)| {
        let clock = text.strip_suffix(marker)?;
        Some((clock.strip_suffix(' ').unwrap_or(clock), *meridiem))
    })
}

// `H:MM` or `HH:MM`; range checks are left to the caller.
fn parse_clock(text: &str) -> Option<(u16, u16)> {
    let (hour, minute) = text.split_once(':')?;
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(1..=2).contains(&hour.len()) || minute.len() != 2 || !all_digits(hour) || !all_digits(minute) {
        return None;
    }
    Some((hour.parse().ok()?, minute.parse().ok()?))
}

pub fn parse_time_of_day(raw: &str) -> Option<TimeOfDay> {
    let text = clean_text(raw).to_uppercase();
    if text.is_empty() {
        return None;
    }

    if let Some((hour, minute)) = parse_clock(&text) {
        return TimeOfDay::from_hm(hour, minute);
    }

    let (clock, meridiem) = split_meridiem(&text)?;
    let (hour, minute) = parse_clock(clock)?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (meridiem, hour) {
        (Meridiem::Am, 12) => 0,
        (Meridiem::Am, h) => h,
        (Meridiem::Pm, 12) => 12,
        (Meridiem::Pm, h) => h + 12,
    };
    TimeOfDay::from_hm(hour, minute)
}

pub fn format_time_of_day(total_minutes: i32) -> String {
    let minutes = total_minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn add_minutes(time: TimeOfDay, delta: i32) -> Shifted {
    let total = i32::from(time.minutes()) + delta;
    Shifted {
        time: TimeOfDay::from_minutes(total),
        day_delta: total.div_euclid(MINUTES_PER_DAY),
    }
}

/// Splits on hyphen, en dash or em dash. Callers reject more than two parts.
pub fn split_range(text: &str) -> Vec<String> {
    clean_text(text)
        .split(|c| matches!(c, '-' | '\u{2013}' | '\u{2014}'))
        .map(|part| part.trim().to_string())
        .collect()
}

pub fn resolve_range(raw: &str, policy: &RangePolicy) -> Result<TimeRange, RangeError> {
    let text = clean_text(raw);
    if text.is_empty() {
        return Err(RangeError::Empty);
    }

    match split_range(&text).as_slice() {
        [start, end] => {
            let start = parse_time_of_day(start).ok_or(RangeError::Format)?;
            let end = parse_time_of_day(end).ok_or(RangeError::Format)?;
            let span = i32::from(end.minutes()) - i32::from(start.minutes());
            if policy.require_exact_duration && span != i32::from(policy.default_duration_minutes) {
                return Err(RangeError::DurationMismatch {
                    expected: policy.default_duration_minutes,
                });
            }
            TimeRange::new(start, end)
        }
        [start] => range_from_start(start, policy),
        _ => Err(RangeError::Malformed),
    }
}

/// Start-only input: one time of day, extended by the default duration.
/// Range text is a format error here.
pub fn range_from_start(raw: &str, policy: &RangePolicy) -> Result<TimeRange, RangeError> {
    let text = clean_text(raw);
    if text.is_empty() {
        return Err(RangeError::Empty);
    }
    let start = parse_time_of_day(&text).ok_or(RangeError::Format)?;
    let shifted = add_minutes(start, i32::from(policy.default_duration_minutes));
    if shifted.day_delta != 0 {
        return Err(RangeError::NextDay);
    }
    TimeRange::new(start, shifted.time)
}

pub fn extract_start(range: &str) -> Option<TimeOfDay> {
    split_range(range).first().and_then(|part| parse_time_of_day(part))
}

pub fn extract_end(range: &str) -> Option<TimeOfDay> {
    split_range(range).get(1).and_then(|part| parse_time_of_day(part))
}
