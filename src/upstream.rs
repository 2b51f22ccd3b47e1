use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;

use crate::models::{ApplicantSheet, CoursePayload, StoredCourse};
use crate::time::Locale;

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("course API unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("course API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("course API sent an unexpected body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Client for the external course-management API.
#[derive(Clone, Debug)]
pub struct CoursesApi {
    client: Client,
    base_url: String,
}

impl CoursesApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn courses_url(&self) -> String {
        format!("{}/api/courses", self.base_url.trim_end_matches('/'))
    }

    pub fn course_url(&self, id: &str) -> String {
        format!("{}/{}", self.courses_url(), utf8_percent_encode(id, PATH_SEGMENT))
    }

    /// Every stored course; a body that is not an array counts as none.
    pub async fn list(&self, lang: Locale) -> Result<Vec<Value>, UpstreamError> {
        let body = self.send(self.client.get(self.courses_url()).query(&[("lang", lang)])).await?;
        match body {
            Value::Array(courses) => Ok(courses),
            other => {
                tracing::warn!(body = %other, "course list is not an array");
                Ok(Vec::new())
            }
        }
    }

    /// Looks a course up by `_id` or slug in the listing; the API has no
    /// single-course read.
    pub async fn find(&self, id_or_slug: &str) -> Result<Option<StoredCourse>, UpstreamError> {
        let found = self.list(Locale::Ar).await?.into_iter().find(|course| {
            course.get("_id").and_then(Value::as_str) == Some(id_or_slug)
                || course.get("slug").and_then(Value::as_str) == Some(id_or_slug)
        });
        Ok(found.map(serde_json::from_value).transpose()?)
    }

    pub async fn create(&self, token: &str, course: &CoursePayload) -> Result<Value, UpstreamError> {
        tracing::info!(slug = %course.fields.slug, "creating course");
        self.send(self.client.post(self.courses_url()).bearer_auth(token).json(course))
            .await
    }

    pub async fn update(&self, token: &str, id: &str, course: &CoursePayload) -> Result<Value, UpstreamError> {
        tracing::info!(course_id = id, "updating course");
        self.send(self.client.put(self.course_url(id)).bearer_auth(token).json(course))
            .await
    }

    pub async fn delete(&self, token: &str, id: &str) -> Result<Value, UpstreamError> {
        tracing::info!(course_id = id, "deleting course");
        self.send(self.client.delete(self.course_url(id)).bearer_auth(token)).await
    }

    pub async fn applicants(&self, id_or_slug: &str) -> Result<ApplicantSheet, UpstreamError> {
        let url = format!("{}/applicants", self.course_url(id_or_slug));
        Ok(serde_json::from_value(self.send(self.client.get(url)).await?)?)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, UpstreamError> {
        let res = req.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        // the API answers errors as {"error": "..."}; bodies may also be empty
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(status = status.as_u16(), error = %e, "course API body is not JSON");
                Value::Null
            })
        };
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}
