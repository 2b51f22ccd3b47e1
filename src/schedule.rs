use thiserror::Error;

use crate::models::{Schedule, ScheduleEntry, ScheduleRecord, WeekDay};
use crate::time::{resolve_range, Locale, RangeError, RangePolicy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("select at least one training day and set its time")]
    Empty,
    #[error("schedule entry {} is not a day/time record", .0 + 1)]
    Malformed(usize),
    #[error("duplicate or invalid day: {0}")]
    InvalidDay(String),
    #[error("duplicate or invalid day: {0}")]
    DuplicateDay(WeekDay),
    #[error("time for {day} is invalid: {source}")]
    Time { day: WeekDay, source: RangeError },
}

impl ScheduleError {
    pub fn message(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.to_string(),
            Locale::Ar => match self {
                ScheduleError::Empty => "اختر على الأقل يوم تدريب وحدد وقته.".into(),
                ScheduleError::Malformed(index) => format!("العنصر رقم {} في الجدول غير صالح", index + 1),
                ScheduleError::InvalidDay(label) => format!("يوم مكرر أو غير صالح: {label}"),
                ScheduleError::DuplicateDay(day) => format!("يوم مكرر أو غير صالح: {}", day.ar()),
                ScheduleError::Time { day, source } => {
                    format!("وقت اليوم {} غير صالح: {}", day.ar(), source.message(Locale::Ar))
                }
            },
        }
    }
}

/// Reads a loosely typed `trainingSchedule` value. Anything that is not an
/// array counts as an empty schedule.
pub fn records_from_value(value: &serde_json::Value) -> Result<Vec<ScheduleRecord>, ScheduleError> {
    let Some(items) = value.as_array() else {
        return Err(ScheduleError::Empty);
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item.clone()).map_err(|_| ScheduleError::Malformed(index))
        })
        .collect()
}

/// Final check before a schedule leaves for the course API. Every day must be
/// known and unique, every time must resolve; the result carries the same
/// canonical range in both locale fields.
pub fn validate_schedule(records: &[ScheduleRecord], policy: &RangePolicy) -> Result<Schedule, ScheduleError> {
    if records.is_empty() {
        return Err(ScheduleError::Empty);
    }

    let mut days: Vec<WeekDay> = Vec::with_capacity(records.len());
    for record in records {
        let label = record.day_label();
        let day = WeekDay::from_label(label).ok_or_else(|| ScheduleError::InvalidDay(label.trim().to_string()))?;
        if days.contains(&day) {
            return Err(ScheduleError::DuplicateDay(day));
        }
        days.push(day);
    }

    records
        .iter()
        .zip(days)
        .map(|(record, day)| {
            let time = resolve_range(record.time_source(), policy).map_err(|source| ScheduleError::Time { day, source })?;
            Ok(ScheduleEntry::with_time(day, time))
        })
        .collect()
}
