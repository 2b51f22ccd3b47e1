use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Schedule, ScheduleEntry, ScheduleRecord, WeekDay};
use crate::schedule::{validate_schedule, ScheduleError};
use crate::time::{extract_end, extract_start, range_from_start, resolve_range, Locale, RangeError, RangePolicy, TimeRange};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// One start time shared by every selected day.
    #[default]
    Unified,
    PerDay,
}

/// Editor state for a course's training days. Every transition returns a new
/// snapshot; the receiver is left as it was.
///
/// Invariants: at most one entry per day, and every stored range is valid
/// under `policy` (unset entries hold no range at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePicker {
    entries: Schedule,
    mode: EditMode,
    unified_start: String,
    per_day_errors: BTreeMap<WeekDay, RangeError>,
    policy: RangePolicy,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub day_en: &'static str,
    pub day_ar: &'static str,
    pub start: String,
    pub end: String,
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PickerView {
    pub mode: EditMode,
    pub unified_start: String,
    pub unified_end: String,
    pub unified_error: Option<String>,
    pub entries: Vec<EntryView>,
}

impl SchedulePicker {
    pub fn new(policy: RangePolicy) -> Self {
        Self {
            entries: Vec::new(),
            mode: EditMode::default(),
            unified_start: String::new(),
            per_day_errors: BTreeMap::new(),
            policy,
        }
    }

    /// Loads a stored schedule for editing. Unknown or repeated days reject
    /// the whole schedule. A time that no longer resolves is loaded as unset
    /// with its error attached to the day, so the editor shows what to fix.
    pub fn from_records(records: &[ScheduleRecord], policy: RangePolicy) -> Result<Self, ScheduleError> {
        let mut picker = Self::new(policy);
        for record in records {
            let day = WeekDay::from_label(record.day_label())
                .ok_or_else(|| ScheduleError::InvalidDay(record.day_label().to_string()))?;
            if picker.is_selected(day) {
                return Err(ScheduleError::DuplicateDay(day));
            }
            let time = match resolve_range(record.time_source(), &policy) {
                Ok(range) => Some(range),
                Err(RangeError::Empty) => None,
                Err(err) => {
                    tracing::debug!(%day, error = %err, "stored time no longer resolves");
                    picker.per_day_errors.insert(day, err);
                    None
                }
            };
            picker.entries.push(ScheduleEntry { day, time });
        }
        Ok(picker)
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn unified_start(&self) -> &str {
        &self.unified_start
    }

    pub fn per_day_error(&self, day: WeekDay) -> Option<RangeError> {
        self.per_day_errors.get(&day).copied()
    }

    pub fn is_selected(&self, day: WeekDay) -> bool {
        self.entries.iter().any(|e| e.day == day)
    }

    fn unified_range(&self) -> Option<Result<TimeRange, RangeError>> {
        if self.unified_start.trim().is_empty() {
            return None;
        }
        Some(range_from_start(&self.unified_start, &self.policy))
    }

    #[must_use]
    pub fn toggle_day(&self, day: WeekDay) -> Self {
        let mut next = self.clone();
        if self.is_selected(day) {
            next.entries.retain(|e| e.day != day);
            next.per_day_errors.remove(&day);
            return next;
        }

        let time = match (self.mode, self.unified_range()) {
            (EditMode::Unified, Some(range)) => range.ok(),
            _ => None,
        };
        next.entries.push(ScheduleEntry { day, time });
        next
    }

    /// Switching modes leaves stored ranges alone until the next edit.
    #[must_use]
    pub fn set_mode(&self, mode: EditMode) -> Self {
        Self { mode, ..self.clone() }
    }

    #[must_use]
    pub fn set_unified_start(&self, text: &str) -> Self {
        let mut next = self.clone();
        next.unified_start = text.to_string();
        if let Some(Ok(range)) = next.unified_range() {
            for entry in &mut next.entries {
                entry.time = Some(range);
            }
            next.per_day_errors.clear();
        }
        next
    }

    /// The end follows from the start and the default duration. A blank start
    /// clears the day's time.
    #[must_use]
    pub fn set_per_day_start(&self, day: WeekDay, text: &str) -> Self {
        if !self.is_selected(day) {
            return self.clone();
        }
        let outcome = match range_from_start(text, &self.policy) {
            Err(RangeError::Empty) => Ok(None),
            other => other.map(Some),
        };
        self.apply_to_day(day, outcome)
    }

    /// A blank end falls back to the default duration from the current start.
    #[must_use]
    pub fn set_per_day_end(&self, day: WeekDay, text: &str) -> Self {
        let Some(entry) = self.entries.iter().find(|e| e.day == day) else {
            return self.clone();
        };
        let outcome = match entry.time.map(|range| range.start()) {
            None => Err(RangeError::MissingStart),
            Some(start) if text.trim().is_empty() => range_from_start(&start.to_string(), &self.policy),
            Some(start) => resolve_range(&format!("{start} - {text}"), &self.policy),
        };
        self.apply_to_day(day, outcome.map(Some))
    }

    fn apply_to_day(&self, day: WeekDay, outcome: Result<Option<TimeRange>, RangeError>) -> Self {
        let mut next = self.clone();
        match outcome {
            Ok(time) => {
                if let Some(entry) = next.entries.iter_mut().find(|e| e.day == day) {
                    entry.time = time;
                }
                next.per_day_errors.remove(&day);
            }
            Err(err) => {
                tracing::debug!(%day, error = %err, "rejected time");
                next.per_day_errors.insert(day, err);
            }
        }
        next
    }

    pub fn records(&self) -> Vec<ScheduleRecord> {
        self.entries.iter().copied().map(ScheduleRecord::from).collect()
    }

    /// Validates and normalizes the current entries for submission.
    pub fn finalize(&self) -> Result<Schedule, ScheduleError> {
        validate_schedule(&self.records(), &self.policy)
    }

    /// Display values; start and end are re-derived from each canonical range.
    pub fn view(&self, locale: Locale) -> PickerView {
        let unified = self.unified_range();
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let canonical = entry.time.map(|t| t.to_string()).unwrap_or_default();
                EntryView {
                    day_en: entry.day.en(),
                    day_ar: entry.day.ar(),
                    start: extract_start(&canonical).map(|t| t.to_string()).unwrap_or_default(),
                    end: extract_end(&canonical).map(|t| t.to_string()).unwrap_or_default(),
                    error: self.per_day_error(entry.day).map(|e| e.message(locale)),
                }
            })
            .collect();

        PickerView {
            mode: self.mode,
            unified_start: self.unified_start.clone(),
            unified_end: match &unified {
                Some(Ok(range)) => range.end().to_string(),
                _ => String::new(),
            },
            unified_error: match &unified {
                Some(Err(err)) => Some(err.message(locale)),
                _ => None,
            },
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picker() -> SchedulePicker {
        SchedulePicker::new(RangePolicy::default())
    }

    fn time_of(picker: &SchedulePicker, day: WeekDay) -> Option<String> {
        picker
            .entries()
            .iter()
            .find(|e| e.day == day)
            .and_then(|e| e.time)
            .map(|t| t.to_string())
    }

    #[test]
    fn toggling_adds_then_removes() {
        let p = picker().toggle_day(WeekDay::Monday).toggle_day(WeekDay::Saturday);
        assert_eq!(p.entries().len(), 2);
        assert_eq!(p.entries()[0].day, WeekDay::Monday);
        assert_eq!(time_of(&p, WeekDay::Monday), None);

        let p = p.toggle_day(WeekDay::Monday);
        assert_eq!(p.entries().len(), 1);
        assert!(!p.is_selected(WeekDay::Monday));
    }

    #[test]
    fn transitions_leave_the_original_untouched() {
        let before = picker().toggle_day(WeekDay::Sunday);
        let after = before.set_unified_start("09:00");
        assert_eq!(time_of(&before, WeekDay::Sunday), None);
        assert_eq!(time_of(&after, WeekDay::Sunday).as_deref(), Some("09:00 - 11:00"));
    }

    #[test]
    fn unified_start_applies_to_every_selected_day() {
        let p = picker()
            .toggle_day(WeekDay::Sunday)
            .toggle_day(WeekDay::Tuesday)
            .set_unified_start("09:00");
        for entry in p.entries() {
            assert_eq!(entry.time.unwrap().to_string(), "09:00 - 11:00");
        }
        let json = serde_json::to_value(p.records()).unwrap();
        assert_eq!(json[1]["time_ar"], "09:00 - 11:00");
        assert_eq!(json[1]["time_en"], "09:00 - 11:00");
    }

    #[test]
    fn day_added_in_unified_mode_gets_the_shared_range() {
        let p = picker().set_unified_start("5:30 PM").toggle_day(WeekDay::Wednesday);
        assert_eq!(time_of(&p, WeekDay::Wednesday).as_deref(), Some("17:30 - 19:30"));

        let p = p.set_mode(EditMode::PerDay).toggle_day(WeekDay::Thursday);
        assert_eq!(time_of(&p, WeekDay::Thursday), None);
    }

    #[test]
    fn invalid_unified_start_changes_nothing() {
        let p = picker().toggle_day(WeekDay::Monday).set_unified_start("08:00");
        let bad = p.set_unified_start("23:30");
        assert_eq!(bad.entries(), p.entries());
        assert_eq!(bad.per_day_error(WeekDay::Monday), None);
        assert_eq!(bad.unified_start(), "23:30");

        let view = bad.view(Locale::En);
        assert_eq!(view.unified_end, "");
        assert_eq!(view.unified_error.as_deref(), Some("session cannot extend into the next day"));

        let added = bad.toggle_day(WeekDay::Friday);
        assert_eq!(time_of(&added, WeekDay::Friday), None);
    }

    #[test]
    fn mode_switch_keeps_ranges() {
        let p = picker().toggle_day(WeekDay::Monday).set_unified_start("10:00");
        let switched = p.set_mode(EditMode::PerDay);
        assert_eq!(switched.mode(), EditMode::PerDay);
        assert_eq!(switched.entries(), p.entries());
    }

    #[test]
    fn per_day_start_derives_the_end() {
        let p = picker()
            .set_mode(EditMode::PerDay)
            .toggle_day(WeekDay::Sunday)
            .set_per_day_start(WeekDay::Sunday, "٩:٠٠ ص");
        assert_eq!(time_of(&p, WeekDay::Sunday).as_deref(), Some("09:00 - 11:00"));
        assert_eq!(p.view(Locale::En).entries[0].end, "11:00");
    }

    #[test]
    fn end_before_start_is_reported_and_entry_kept() {
        let p = picker()
            .set_mode(EditMode::PerDay)
            .toggle_day(WeekDay::Sunday)
            .set_per_day_start(WeekDay::Sunday, "09:00");
        let rejected = p.set_per_day_end(WeekDay::Sunday, "08:00");
        assert_eq!(rejected.entries(), p.entries());
        assert_eq!(rejected.per_day_error(WeekDay::Sunday), Some(RangeError::Order));
        assert_eq!(
            rejected.view(Locale::En).entries[0].error.as_deref(),
            Some("end time must be after start time")
        );

        let fixed = rejected.set_per_day_end(WeekDay::Sunday, "12:30");
        assert_eq!(time_of(&fixed, WeekDay::Sunday).as_deref(), Some("09:00 - 12:30"));
        assert_eq!(fixed.per_day_error(WeekDay::Sunday), None);
        assert_eq!(fixed.view(Locale::En).entries[0].end, "12:30");
    }

    #[test]
    fn blank_end_restores_default_length() {
        let p = picker()
            .toggle_day(WeekDay::Monday)
            .set_per_day_start(WeekDay::Monday, "14:00")
            .set_per_day_end(WeekDay::Monday, "18:00")
            .set_per_day_end(WeekDay::Monday, "  ");
        assert_eq!(time_of(&p, WeekDay::Monday).as_deref(), Some("14:00 - 16:00"));
    }

    #[test]
    fn end_without_start_needs_a_start() {
        let p = picker().toggle_day(WeekDay::Monday).set_per_day_end(WeekDay::Monday, "10:00");
        assert_eq!(p.per_day_error(WeekDay::Monday), Some(RangeError::MissingStart));
        assert_eq!(time_of(&p, WeekDay::Monday), None);
    }

    #[test]
    fn per_day_failures_never_store_half_values() {
        let p = picker()
            .toggle_day(WeekDay::Friday)
            .set_per_day_start(WeekDay::Friday, "18:00");
        for bad in ["23:00", "25:00", "soon"] {
            let next = p.set_per_day_start(WeekDay::Friday, bad);
            assert_eq!(time_of(&next, WeekDay::Friday).as_deref(), Some("18:00 - 20:00"));
            assert!(next.per_day_error(WeekDay::Friday).is_some());
        }
    }

    #[test]
    fn blank_start_clears_time_and_error() {
        let p = picker()
            .toggle_day(WeekDay::Friday)
            .set_per_day_start(WeekDay::Friday, "18:00")
            .set_per_day_start(WeekDay::Friday, "23:00")
            .set_per_day_start(WeekDay::Friday, "");
        assert_eq!(time_of(&p, WeekDay::Friday), None);
        assert_eq!(p.per_day_error(WeekDay::Friday), None);
    }

    #[test]
    fn removing_a_day_drops_its_error() {
        let p = picker()
            .toggle_day(WeekDay::Friday)
            .set_per_day_start(WeekDay::Friday, "nope")
            .toggle_day(WeekDay::Friday)
            .toggle_day(WeekDay::Friday);
        assert_eq!(p.per_day_error(WeekDay::Friday), None);
    }

    #[test]
    fn edits_for_unselected_days_are_ignored() {
        let p = picker().toggle_day(WeekDay::Monday);
        assert_eq!(p.set_per_day_start(WeekDay::Tuesday, "10:00"), p);
        assert_eq!(p.set_per_day_end(WeekDay::Tuesday, "12:00"), p);
    }

    #[test]
    fn loading_records_flags_unresolvable_times() {
        let records = vec![
            ScheduleRecord::new(WeekDay::Monday, "5:30 PM"),
            ScheduleRecord::new(WeekDay::Tuesday, "23:30"),
            ScheduleRecord::new(WeekDay::Wednesday, ""),
        ];
        let p = SchedulePicker::from_records(&records, RangePolicy::default()).unwrap();
        assert_eq!(p.entries().len(), 3);
        assert_eq!(time_of(&p, WeekDay::Monday).as_deref(), Some("17:30 - 19:30"));
        assert_eq!(time_of(&p, WeekDay::Tuesday), None);
        assert_eq!(p.per_day_error(WeekDay::Tuesday), Some(RangeError::NextDay));
        assert_eq!(p.per_day_error(WeekDay::Wednesday), None);
        assert_eq!(
            p.view(Locale::En).entries[1].error.as_deref(),
            Some("session cannot extend into the next day")
        );
    }

    #[test]
    fn loading_records_rejects_unknown_and_repeated_days() {
        let repeated = vec![
            ScheduleRecord::new(WeekDay::Monday, "09:00"),
            ScheduleRecord { day_ar: "الاثنين".into(), time_ar: "10:00".into(), ..Default::default() },
        ];
        assert_eq!(
            SchedulePicker::from_records(&repeated, RangePolicy::default()),
            Err(ScheduleError::DuplicateDay(WeekDay::Monday))
        );

        let unknown = vec![ScheduleRecord { day_en: "Someday".into(), ..Default::default() }];
        assert_eq!(
            SchedulePicker::from_records(&unknown, RangePolicy::default()),
            Err(ScheduleError::InvalidDay("Someday".into()))
        );
    }

    #[test]
    fn start_fields_reject_range_text() {
        let p = picker().toggle_day(WeekDay::Monday).set_unified_start("08:00");
        let bad = p.set_unified_start("08:00 - 08:30");
        assert_eq!(bad.entries(), p.entries());
        assert_eq!(bad.view(Locale::En).unified_end, "");
        assert!(bad.view(Locale::En).unified_error.is_some());

        let per_day = p.set_mode(EditMode::PerDay).set_per_day_start(WeekDay::Monday, "08:00 - 08:30");
        assert_eq!(time_of(&per_day, WeekDay::Monday).as_deref(), Some("08:00 - 10:00"));
        assert_eq!(per_day.per_day_error(WeekDay::Monday), Some(RangeError::Format));
    }

    #[test]
    fn finalize_requires_every_day_to_have_a_time() {
        let p = picker().toggle_day(WeekDay::Monday).set_unified_start("09:00").toggle_day(WeekDay::Tuesday);
        assert_eq!(p.finalize().unwrap().len(), 2);

        let p = p.set_mode(EditMode::PerDay).set_per_day_start(WeekDay::Tuesday, "");
        assert_eq!(
            p.finalize(),
            Err(ScheduleError::Time { day: WeekDay::Tuesday, source: RangeError::Empty })
        );
        assert_eq!(picker().finalize(), Err(ScheduleError::Empty));
    }

    #[test]
    fn arabic_view_messages() {
        let p = picker().toggle_day(WeekDay::Saturday).set_per_day_start(WeekDay::Saturday, "23:00");
        let view = p.view(Locale::Ar);
        assert_eq!(view.entries[0].day_ar, "السبت");
        assert_eq!(view.entries[0].error.as_deref(), Some("لا يمكن أن يمتد الوقت لليوم التالي"));
        assert_eq!(view.entries[0].start, "");
    }
}
