use chrono::Weekday;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{json::JsonString, serde_as, DefaultOnNull, DeserializeFromStr, PickFirst, SerializeDisplay};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::time::{clean_text, Locale, TimeRange};

/// Training days in the order the dashboard lists them (week starts Saturday).
#[derive(SerializeDisplay, DeserializeFromStr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeekDay {
    Saturday,
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Saturday,
        WeekDay::Sunday,
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
    ];

    pub fn en(self) -> &'static str {
        match self {
            WeekDay::Saturday => "Saturday",
            WeekDay::Sunday => "Sunday",
            WeekDay::Monday => "Monday",
            WeekDay::Tuesday => "Tuesday",
            WeekDay::Wednesday => "Wednesday",
            WeekDay::Thursday => "Thursday",
            WeekDay::Friday => "Friday",
        }
    }

    pub fn ar(self) -> &'static str {
        match self {
            WeekDay::Saturday => "السبت",
            WeekDay::Sunday => "الأحد",
            WeekDay::Monday => "الاثنين",
            WeekDay::Tuesday => "الثلاثاء",
            WeekDay::Wednesday => "الأربعاء",
            WeekDay::Thursday => "الخميس",
            WeekDay::Friday => "الجمعة",
        }
    }

    /// Accepts the English name (any case) or the Arabic name.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = clean_text(label);
        Self::ALL
            .into_iter()
            .find(|day| day.en().eq_ignore_ascii_case(&label) || day.ar() == label)
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.en())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown week day: {0}")]
pub struct UnknownDay(pub String);

impl FromStr for WeekDay {
    type Err = UnknownDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| UnknownDay(s.to_string()))
    }
}

impl From<Weekday> for WeekDay {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sat => WeekDay::Saturday,
            Weekday::Sun => WeekDay::Sunday,
            Weekday::Mon => WeekDay::Monday,
            Weekday::Tue => WeekDay::Tuesday,
            Weekday::Wed => WeekDay::Wednesday,
            Weekday::Thu => WeekDay::Thursday,
            Weekday::Fri => WeekDay::Friday,
        }
    }
}

/// One `trainingSchedule` element as exchanged with the dashboard and the
/// course API. Nothing here is trusted until `validate_schedule` has run.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleRecord {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub day_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub day_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub time_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub time_ar: String,
}

impl ScheduleRecord {
    pub fn new(day: WeekDay, time: &str) -> Self {
        Self {
            day_en: day.en().into(),
            day_ar: day.ar().into(),
            time_en: time.into(),
            time_ar: time.into(),
        }
    }

    /// `day_en` identifies the day; `day_ar` is the fallback.
    pub fn day_label(&self) -> &str {
        if self.day_en.trim().is_empty() {
            &self.day_ar
        } else {
            &self.day_en
        }
    }

    /// The Arabic field wins whenever it holds anything.
    pub fn time_source(&self) -> &str {
        if clean_text(&self.time_ar).is_empty() {
            &self.time_en
        } else {
            &self.time_ar
        }
    }
}

/// A selected day and its session. Both locale fields always carry the same
/// range, so only one is stored.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(into = "ScheduleRecord")]
pub struct ScheduleEntry {
    pub day: WeekDay,
    pub time: Option<TimeRange>,
}

impl ScheduleEntry {
    pub fn with_time(day: WeekDay, time: TimeRange) -> Self {
        Self { day, time: Some(time) }
    }
}

impl From<ScheduleEntry> for ScheduleRecord {
    fn from(entry: ScheduleEntry) -> Self {
        let time = entry.time.map(|t| t.to_string()).unwrap_or_default();
        ScheduleRecord::new(entry.day, &time)
    }
}

pub type Schedule = Vec<ScheduleEntry>;

/// Course fields edited alongside the schedule. The names on the wire follow
/// the course API; stored courses may carry `null` for unset fields.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CourseFields {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub title_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub title_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub level_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub level_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "trainingHours_ar")]
    pub training_hours_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "trainingHours_en")]
    pub training_hours_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub instructor_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub instructor_en: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "formLink")]
    pub form_link: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "sheetLink")]
    pub sheet_link: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub slug: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub image: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub description_ar: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub description_en: String,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("field {0} is empty")]
pub struct MissingField(pub &'static str);

impl MissingField {
    pub fn message(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.to_string(),
            Locale::Ar => format!("الحقل {} فارغ", self.0),
        }
    }
}

impl CourseFields {
    fn required(&self) -> [(&'static str, &str); 14] {
        [
            ("title_ar", self.title_ar.as_str()),
            ("title_en", self.title_en.as_str()),
            ("description_ar", self.description_ar.as_str()),
            ("description_en", self.description_en.as_str()),
            ("level_ar", self.level_ar.as_str()),
            ("level_en", self.level_en.as_str()),
            ("instructor_ar", self.instructor_ar.as_str()),
            ("instructor_en", self.instructor_en.as_str()),
            ("trainingHours_ar", self.training_hours_ar.as_str()),
            ("trainingHours_en", self.training_hours_en.as_str()),
            ("formLink", self.form_link.as_str()),
            ("sheetLink", self.sheet_link.as_str()),
            ("slug", self.slug.as_str()),
            ("image", self.image.as_str()),
        ]
    }

    /// New courses must have every field filled in.
    pub fn check_complete(&self) -> Result<(), MissingField> {
        match self.required().into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(MissingField(name)),
            None => Ok(()),
        }
    }

    pub fn apply(&mut self, patch: CourseFieldsPatch) {
        if let Some(title_en) = patch.title_en {
            self.slug = slugify(&title_en);
            self.title_en = title_en;
        }
        let targets = [
            (patch.title_ar, &mut self.title_ar),
            (patch.level_ar, &mut self.level_ar),
            (patch.level_en, &mut self.level_en),
            (patch.training_hours_ar, &mut self.training_hours_ar),
            (patch.training_hours_en, &mut self.training_hours_en),
            (patch.instructor_ar, &mut self.instructor_ar),
            (patch.instructor_en, &mut self.instructor_en),
            (patch.form_link, &mut self.form_link),
            (patch.sheet_link, &mut self.sheet_link),
            (patch.slug, &mut self.slug),
            (patch.image, &mut self.image),
            (patch.description_ar, &mut self.description_ar),
            (patch.description_en, &mut self.description_en),
        ];
        for (value, field) in targets {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

/// Partial update of a draft's course fields. A new `title_en` regenerates the
/// slug unless the same patch also sets `slug`.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CourseFieldsPatch {
    pub title_ar: Option<String>,
    pub title_en: Option<String>,
    pub level_ar: Option<String>,
    pub level_en: Option<String>,
    #[serde(rename = "trainingHours_ar")]
    pub training_hours_ar: Option<String>,
    #[serde(rename = "trainingHours_en")]
    pub training_hours_en: Option<String>,
    pub instructor_ar: Option<String>,
    pub instructor_en: Option<String>,
    #[serde(rename = "formLink")]
    pub form_link: Option<String>,
    #[serde(rename = "sheetLink")]
    pub sheet_link: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    pub description_ar: Option<String>,
    pub description_en: Option<String>,
}

/// URL slug from an English title: lowercase, word characters, spaces and
/// dashes only, whitespace runs turned into `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            in_space = false;
        }
    }
    slug
}

/// Body sent to the course API on create/update.
#[derive(Serialize, Debug, Clone)]
pub struct CoursePayload {
    #[serde(flatten)]
    pub fields: CourseFields,
    #[serde(rename = "trainingSchedule")]
    pub training_schedule: Schedule,
}

/// A course as the course API lists it. Courses created through form uploads
/// keep `trainingSchedule` as a JSON-encoded string.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct StoredCourse {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: CourseFields,
    #[serde(rename = "trainingSchedule", default)]
    #[serde_as(deserialize_as = "DefaultOnNull<PickFirst<(_, JsonString)>>")]
    pub training_schedule: Vec<ScheduleRecord>,
}

impl From<StoredCourse> for OpenDraftReq {
    fn from(course: StoredCourse) -> Self {
        Self {
            course_id: Some(course.id),
            fields: course.fields,
            training_schedule: course.training_schedule,
        }
    }
}

/// Applicant sheet rows for one course, as the course API returns them.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ApplicantSheet {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub headers: Vec<Value>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub rows: Vec<Value>,
    #[serde(rename = "tabTitle")]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub tab_title: String,
}

impl ApplicantSheet {
    /// Rows that are arrays with at least one non-blank cell.
    pub fn filled_rows(&self) -> usize {
        self.rows
            .iter()
            .filter_map(Value::as_array)
            .filter(|row| row.iter().any(|cell| !cell_is_blank(cell)))
            .count()
    }
}

fn cell_is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ApplicantsView {
    #[serde(flatten)]
    pub sheet: ApplicantSheet,
    pub count: usize,
}

impl From<ApplicantSheet> for ApplicantsView {
    fn from(sheet: ApplicantSheet) -> Self {
        let count = sheet.filled_rows();
        Self { sheet, count }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TimeReq {
    #[serde(default)]
    pub time: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ValidateReq {
    #[serde(rename = "trainingSchedule", default)]
    pub training_schedule: Value,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct OpenDraftReq {
    /// Set when editing an existing course.
    #[serde(rename = "courseId", default)]
    pub course_id: Option<String>,
    #[serde(flatten)]
    pub fields: CourseFields,
    #[serde(rename = "trainingSchedule", default)]
    pub training_schedule: Vec<ScheduleRecord>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct LangQuery {
    #[serde(default)]
    pub lang: Locale,
}

#[derive(Serialize, Debug, Clone)]
pub struct WeekDayView {
    pub day_en: &'static str,
    pub day_ar: &'static str,
    pub today: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ResolvedTime {
    pub range: TimeRange,
    pub start: String,
    pub end: String,
}
