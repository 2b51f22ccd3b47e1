use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Datelike, Local};
use http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::Config,
    models::*,
    picker::EditMode,
    schedule::{records_from_value, validate_schedule},
    store::{Draft, DraftError, DraftStore, DraftView},
    time::{resolve_range, Locale, RangePolicy},
    upstream::{CoursesApi, UpstreamError},
};

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub drafts: DraftStore,
    pub api: CoursesApi,
    pub policy: RangePolicy,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            drafts: DraftStore::default(),
            api: CoursesApi::new(config.courses_api_url.clone()),
            policy: config.policy,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // engine
        .route("/api/week-days", get(week_days))
        .route("/api/schedule/resolve", post(resolve_time))
        .route("/api/schedule/validate", post(validate))
        // course drafts + schedule editor
        .route("/api/drafts", post(open_draft))
        .route("/api/drafts/:id", get(get_draft).delete(discard_draft))
        .route("/api/drafts/:id/fields", patch(update_fields))
        .route("/api/drafts/:id/mode", put(set_mode))
        .route("/api/drafts/:id/unified-start", put(set_unified_start))
        .route("/api/drafts/:id/days/:day", post(toggle_day))
        .route("/api/drafts/:id/days/:day/start", put(set_day_start))
        .route("/api/drafts/:id/days/:day/end", put(set_day_end))
        .route("/api/drafts/:id/submit", post(submit_draft))
        // stored courses
        .route("/api/courses", get(list_courses))
        .route("/api/courses/:id", delete(delete_course))
        .route("/api/courses/:id/applicants", get(course_applicants))
        .route("/api/courses/:id/draft", post(open_course_draft))
        .with_state(state)
}

async fn week_days() -> Json<Vec<WeekDayView>> {
    let today = WeekDay::from(Local::now().weekday());
    Json(
        WeekDay::ALL
            .into_iter()
            .map(|day| WeekDayView {
                day_en: day.en(),
                day_ar: day.ar(),
                today: day == today,
            })
            .collect(),
    )
}

async fn resolve_time(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    Json(req): Json<TimeReq>,
) -> Result<Json<ResolvedTime>, ApiError> {
    let range = resolve_range(&req.time, &state.policy).map_err(|e| e422(e.message(q.lang)))?;
    Ok(Json(ResolvedTime {
        range,
        start: range.start().to_string(),
        end: range.end().to_string(),
    }))
}

async fn validate(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    Json(req): Json<ValidateReq>,
) -> Result<Json<Schedule>, ApiError> {
    let records = records_from_value(&req.training_schedule).map_err(|e| e422(e.message(q.lang)))?;
    let schedule = validate_schedule(&records, &state.policy).map_err(|e| e422(e.message(q.lang)))?;
    Ok(Json(schedule))
}

/// An empty body opens a blank draft; anything else must be a valid request.
async fn open_draft(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    body: Bytes,
) -> Result<Json<DraftView>, ApiError> {
    let req: OpenDraftReq = if body.iter().all(u8::is_ascii_whitespace) {
        OpenDraftReq::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| e400(format!("invalid draft: {e}")))?
    };
    insert_draft(&state, req, q.lang).await
}

async fn insert_draft(state: &AppState, req: OpenDraftReq, lang: Locale) -> Result<Json<DraftView>, ApiError> {
    let draft = Draft::open(req, state.policy).map_err(|e| e422(e.message(lang)))?;
    let id = state.drafts.insert(draft.clone()).await;
    tracing::info!(draft = %id, course_id = ?draft.course_id, "draft opened");
    Ok(Json(DraftView::new(id, &draft, lang)))
}

async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<LangQuery>,
) -> Result<Json<DraftView>, ApiError> {
    let draft = state.drafts.get(id).await.map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn discard_draft(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.drafts.remove(id).await.map_err(draft_error)?;
    tracing::info!(draft = %id, "draft discarded");
    Ok(StatusCode::NO_CONTENT)
}

async fn update_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<LangQuery>,
    Json(patch): Json<CourseFieldsPatch>,
) -> Result<Json<DraftView>, ApiError> {
    let draft = state
        .drafts
        .update(id, |d| d.fields.apply(patch))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

#[derive(serde::Deserialize)]
struct ModeReq {
    mode: EditMode,
}

async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<LangQuery>,
    Json(req): Json<ModeReq>,
) -> Result<Json<DraftView>, ApiError> {
    let draft = state
        .drafts
        .update(id, |d| d.picker = d.picker.set_mode(req.mode))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn set_unified_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<LangQuery>,
    Json(req): Json<TimeReq>,
) -> Result<Json<DraftView>, ApiError> {
    let draft = state
        .drafts
        .update(id, |d| d.picker = d.picker.set_unified_start(&req.time))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn toggle_day(
    State(state): State<AppState>,
    Path((id, day)): Path<(Uuid, String)>,
    Query(q): Query<LangQuery>,
) -> Result<Json<DraftView>, ApiError> {
    let day = parse_day(&day)?;
    let draft = state
        .drafts
        .update(id, |d| d.picker = d.picker.toggle_day(day))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn set_day_start(
    State(state): State<AppState>,
    Path((id, day)): Path<(Uuid, String)>,
    Query(q): Query<LangQuery>,
    Json(req): Json<TimeReq>,
) -> Result<Json<DraftView>, ApiError> {
    let day = parse_day(&day)?;
    let draft = state
        .drafts
        .update(id, |d| d.picker = d.picker.set_per_day_start(day, &req.time))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn set_day_end(
    State(state): State<AppState>,
    Path((id, day)): Path<(Uuid, String)>,
    Query(q): Query<LangQuery>,
    Json(req): Json<TimeReq>,
) -> Result<Json<DraftView>, ApiError> {
    let day = parse_day(&day)?;
    let draft = state
        .drafts
        .update(id, |d| d.picker = d.picker.set_per_day_end(day, &req.time))
        .await
        .map_err(draft_error)?;
    Ok(Json(DraftView::new(id, &draft, q.lang)))
}

async fn submit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<LangQuery>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, ApiError> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or_else(|| e401("missing bearer token"))?;
    let draft = state.drafts.begin_submit(id).await.map_err(draft_error)?;

    // detached, so a dropped connection still hands a failed draft back
    let task = tokio::spawn(async move {
        let outcome = push_draft(&state.api, &draft, bearer.token(), q.lang).await;
        state.drafts.finish_submit(id, outcome.is_err().then_some(draft)).await;
        outcome
    });
    let result = task.await.map_err(e500)??;
    tracing::info!(draft = %id, "course submitted");
    Ok(Json(result))
}

async fn push_draft(api: &CoursesApi, draft: &Draft, token: &str, lang: Locale) -> Result<Value, ApiError> {
    // only new courses must arrive complete; updates send what the draft holds
    if draft.course_id.is_none() {
        draft.fields.check_complete().map_err(|e| e400(e.message(lang)))?;
    }
    let training_schedule = draft.picker.finalize().map_err(|e| e422(e.message(lang)))?;

    let payload = CoursePayload {
        fields: draft.fields.clone(),
        training_schedule,
    };
    match &draft.course_id {
        Some(course_id) => api.update(token, course_id, &payload).await,
        None => api.create(token, &payload).await,
    }
    .map_err(e502)
}

async fn list_courses(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Json<Vec<Value>>, ApiError> {
    let courses = state.api.list(q.lang).await.map_err(e502)?;
    Ok(Json(courses))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, ApiError> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or_else(|| e401("missing bearer token"))?;
    let result = state.api.delete(bearer.token(), &id).await.map_err(e502)?;
    tracing::info!(course_id = %id, "course deleted");
    Ok(Json(result))
}

async fn course_applicants(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> Result<Json<ApplicantsView>, ApiError> {
    let sheet = state.api.applicants(&id_or_slug).await.map_err(e502)?;
    Ok(Json(sheet.into()))
}

/// Opens an edit draft from the stored course, schedule included.
async fn open_course_draft(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Json<DraftView>, ApiError> {
    let course = state
        .api
        .find(&id_or_slug)
        .await
        .map_err(e502)?
        .ok_or_else(|| e404(format!("course not found: {id_or_slug}")))?;
    insert_draft(&state, course.into(), q.lang).await
}

// --- helpers ---
fn parse_day(label: &str) -> Result<WeekDay, ApiError> {
    WeekDay::from_label(label).ok_or_else(|| e404(format!("unknown day: {label}")))
}

fn draft_error(e: DraftError) -> ApiError {
    match e {
        DraftError::NotFound => e404(e.to_string()),
        DraftError::Submitting => (StatusCode::CONFLICT, e.to_string()),
    }
}

fn e400<T: Into<String>>(msg: T) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn e401<T: Into<String>>(msg: T) -> ApiError {
    (StatusCode::UNAUTHORIZED, msg.into())
}

fn e404<T: Into<String>>(msg: T) -> ApiError {
    (StatusCode::NOT_FOUND, msg.into())
}

fn e422<T: Into<String>>(msg: T) -> ApiError {
    (StatusCode::UNPROCESSABLE_ENTITY, msg.into())
}

fn e500<E: std::fmt::Display>(e: E) -> ApiError {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}

fn e502(e: UpstreamError) -> ApiError {
    tracing::warn!(error=%e, "course API call failed");
    let msg = match e {
        UpstreamError::Rejected { message, .. } => message,
        other => other.to_string(),
    };
    (StatusCode::BAD_GATEWAY, msg)
}
