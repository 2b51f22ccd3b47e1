use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{CourseFields, OpenDraftReq, ScheduleRecord};
use crate::picker::{PickerView, SchedulePicker};
use crate::schedule::ScheduleError;
use crate::time::{Locale, RangePolicy};

/// A course being created or edited in one dashboard session.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Present when the draft edits an existing course.
    pub course_id: Option<String>,
    pub fields: CourseFields,
    pub picker: SchedulePicker,
}

impl Draft {
    pub fn open(req: OpenDraftReq, policy: RangePolicy) -> Result<Self, ScheduleError> {
        Ok(Self {
            course_id: req.course_id.filter(|id| !id.trim().is_empty()),
            fields: req.fields,
            picker: SchedulePicker::from_records(&req.training_schedule, policy)?,
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft not found")]
    NotFound,
    #[error("draft is being submitted")]
    Submitting,
}

#[derive(Serialize, Debug, Clone)]
pub struct DraftView {
    pub id: Uuid,
    #[serde(rename = "courseId")]
    pub course_id: Option<String>,
    #[serde(flatten)]
    pub fields: CourseFields,
    #[serde(rename = "trainingSchedule")]
    pub training_schedule: Vec<ScheduleRecord>,
    pub editor: PickerView,
}

impl DraftView {
    pub fn new(id: Uuid, draft: &Draft, locale: Locale) -> Self {
        Self {
            id,
            course_id: draft.course_id.clone(),
            fields: draft.fields.clone(),
            training_schedule: draft.picker.records(),
            editor: draft.picker.view(locale),
        }
    }
}

#[derive(Default)]
struct Drafts {
    open: HashMap<Uuid, Draft>,
    /// Taken out of `open` while the course API call runs.
    submitting: HashSet<Uuid>,
}

impl Drafts {
    fn check(&self, id: Uuid) -> Result<(), DraftError> {
        if self.submitting.contains(&id) {
            return Err(DraftError::Submitting);
        }
        Ok(())
    }
}

/// Open drafts, in memory only. Each call holds the lock for the whole
/// transition, so edits to a draft never interleave.
#[derive(Clone, Default)]
pub struct DraftStore {
    drafts: Arc<Mutex<Drafts>>,
}

impl DraftStore {
    pub async fn insert(&self, draft: Draft) -> Uuid {
        let id = Uuid::new_v4();
        self.drafts.lock().await.open.insert(id, draft);
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<Draft, DraftError> {
        let drafts = self.drafts.lock().await;
        drafts.check(id)?;
        drafts.open.get(&id).cloned().ok_or(DraftError::NotFound)
    }

    /// Runs `f` on the draft and returns the updated copy.
    pub async fn update(&self, id: Uuid, f: impl FnOnce(&mut Draft)) -> Result<Draft, DraftError> {
        let mut drafts = self.drafts.lock().await;
        drafts.check(id)?;
        let draft = drafts.open.get_mut(&id).ok_or(DraftError::NotFound)?;
        f(draft);
        Ok(draft.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<Draft, DraftError> {
        let mut drafts = self.drafts.lock().await;
        drafts.check(id)?;
        drafts.open.remove(&id).ok_or(DraftError::NotFound)
    }

    /// Takes the draft out for submission. Until `finish_submit`, every other
    /// call for this id fails with `Submitting`.
    pub async fn begin_submit(&self, id: Uuid) -> Result<Draft, DraftError> {
        let mut drafts = self.drafts.lock().await;
        drafts.check(id)?;
        let draft = drafts.open.remove(&id).ok_or(DraftError::NotFound)?;
        drafts.submitting.insert(id);
        Ok(draft)
    }

    /// Ends a submission; a failed one hands the draft back for more edits.
    pub async fn finish_submit(&self, id: Uuid, restore: Option<Draft>) {
        let mut drafts = self.drafts.lock().await;
        drafts.submitting.remove(&id);
        if let Some(draft) = restore {
            drafts.open.insert(id, draft);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekDay;

    fn blank() -> Draft {
        Draft::open(OpenDraftReq::default(), RangePolicy::default()).unwrap()
    }

    #[tokio::test]
    async fn drafts_are_updated_in_place_and_removed() {
        let store = DraftStore::default();
        let id = store.insert(blank()).await;

        let updated = store
            .update(id, |d| d.picker = d.picker.toggle_day(WeekDay::Monday))
            .await
            .unwrap();
        assert!(updated.picker.is_selected(WeekDay::Monday));
        assert!(store.get(id).await.unwrap().picker.is_selected(WeekDay::Monday));

        assert!(store.remove(id).await.is_ok());
        assert_eq!(store.get(id).await.unwrap_err(), DraftError::NotFound);
        assert_eq!(store.update(id, |_| {}).await.unwrap_err(), DraftError::NotFound);
    }

    #[tokio::test]
    async fn submission_holds_the_draft_exclusively() {
        let store = DraftStore::default();
        let id = store.insert(blank()).await;

        let draft = store.begin_submit(id).await.unwrap();
        assert_eq!(store.begin_submit(id).await.unwrap_err(), DraftError::Submitting);
        assert_eq!(store.get(id).await.unwrap_err(), DraftError::Submitting);
        assert_eq!(store.update(id, |_| {}).await.unwrap_err(), DraftError::Submitting);
        assert_eq!(store.remove(id).await.unwrap_err(), DraftError::Submitting);

        store.finish_submit(id, Some(draft)).await;
        let draft = store.begin_submit(id).await.unwrap();
        assert!(draft.course_id.is_none());

        store.finish_submit(id, None).await;
        assert_eq!(store.get(id).await.unwrap_err(), DraftError::NotFound);
    }

    #[test]
    fn opening_an_existing_course_loads_its_schedule() {
        let req = OpenDraftReq {
            course_id: Some("42".into()),
            training_schedule: vec![ScheduleRecord::new(WeekDay::Sunday, "17:00 - 19:00")],
            ..Default::default()
        };
        let draft = Draft::open(req, RangePolicy::default()).unwrap();
        assert_eq!(draft.course_id.as_deref(), Some("42"));

        let view = DraftView::new(Uuid::nil(), &draft, Locale::En);
        assert_eq!(view.training_schedule[0].time_en, "17:00 - 19:00");
        assert_eq!(view.editor.entries[0].start, "17:00");

        let blank = Draft::open(OpenDraftReq { course_id: Some(" ".into()), ..Default::default() }, RangePolicy::default())
            .unwrap();
        assert_eq!(blank.course_id, None);
    }

    #[test]
    fn opening_a_schedule_with_repeated_days_fails() {
        let req = OpenDraftReq {
            training_schedule: vec![
                ScheduleRecord::new(WeekDay::Sunday, "09:00"),
                ScheduleRecord::new(WeekDay::Sunday, "11:00"),
            ],
            ..Default::default()
        };
        assert_eq!(
            Draft::open(req, RangePolicy::default()).unwrap_err(),
            ScheduleError::DuplicateDay(WeekDay::Sunday)
        );
    }
}
