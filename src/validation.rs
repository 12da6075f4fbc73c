//! Request body schemas for the task tracker and account endpoints.
//!
//! Bodies are deserialized with every field optional, then checked with
//! [`Validate`], so a missing field is reported by name instead of as a
//! generic JSON error.

use crate::models::{Task, TaskStatus};
use crate::storage::Document;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// Schema check for a request body.
pub trait Validate {
    /// Returns a message naming the first offending field.
    fn validate(&self) -> Result<(), String>;
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

/// Check that `value` looks like an email address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[A-Za-z]{2,}$").expect("Invalid regex")
        })
        .is_match(value)
}

fn check_email(field: &str, value: Option<&str>) -> Result<(), String> {
    match value {
        None => Err(format!("\"{}\" is required", field)),
        Some(v) if !is_valid_email(v) => Err(format!("\"{}\" must be a valid email", field)),
        Some(_) => Ok(()),
    }
}

fn check_title(value: &str) -> Result<(), String> {
    let len = value.chars().count();
    if len == 0 {
        return Err("\"title\" is not allowed to be empty".to_string());
    }
    if len > TITLE_MAX_CHARS {
        return Err(format!(
            "\"title\" length must be less than or equal to {} characters long",
            TITLE_MAX_CHARS
        ));
    }
    Ok(())
}

fn check_description(value: &str) -> Result<(), String> {
    if value.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "\"description\" length must be less than or equal to {} characters long",
            DESCRIPTION_MAX_CHARS
        ));
    }
    Ok(())
}

fn check_status(value: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(value)
        .ok_or_else(|| "\"status\" must be one of [pending, in-progress, done]".to_string())
}

/// `POST /tasks` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub user: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl Validate for NewTask {
    fn validate(&self) -> Result<(), String> {
        check_email("user", self.user.as_deref())?;
        match self.title.as_deref() {
            None => return Err("\"title\" is required".to_string()),
            Some(title) => check_title(title)?,
        }
        if let Some(ref description) = self.description {
            check_description(description)?;
        }
        if let Some(ref status) = self.status {
            check_status(status)?;
        }
        Ok(())
    }
}

impl NewTask {
    /// Build the stored task. Call after [`Validate::validate`] succeeds.
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.user.unwrap_or_default(), self.title.unwrap_or_default());
        task.description = self.description.unwrap_or_default();
        task.status = self
            .status
            .as_deref()
            .and_then(TaskStatus::parse)
            .unwrap_or_default();
        task
    }
}

/// `PUT /tasks/:taskId` body. Only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub user: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl Validate for TaskUpdate {
    fn validate(&self) -> Result<(), String> {
        if self.user.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
        {
            return Err("\"value\" must contain at least one of [user, title, description, status]"
                .to_string());
        }
        if self.user.is_some() {
            check_email("user", self.user.as_deref())?;
        }
        if let Some(ref title) = self.title {
            check_title(title)?;
        }
        if let Some(ref description) = self.description {
            check_description(description)?;
        }
        if let Some(ref status) = self.status {
            check_status(status)?;
        }
        Ok(())
    }
}

impl TaskUpdate {
    /// Top-level fields to merge into the stored task, stamped with
    /// `dateUpdated`.
    pub fn into_fields(self) -> Document {
        let mut fields = Document::new();
        if let Some(user) = self.user {
            fields.insert("user".to_string(), Value::String(user));
        }
        if let Some(title) = self.title {
            fields.insert("title".to_string(), Value::String(title));
        }
        if let Some(description) = self.description {
            fields.insert("description".to_string(), Value::String(description));
        }
        if let Some(status) = self.status {
            fields.insert("status".to_string(), Value::String(status));
        }
        fields.insert(
            "dateUpdated".to_string(),
            serde_json::to_value(Utc::now()).unwrap_or(Value::Null),
        );
        fields
    }
}

/// `POST /users` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub email: Option<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), String> {
        check_email("email", self.email.as_deref())
    }
}

/// `POST /api/register` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
}

impl Validate for Registration {
    fn validate(&self) -> Result<(), String> {
        check_email("email", self.email.as_deref())?;
        match self.password.as_deref() {
            None => Err("\"password\" is required".to_string()),
            Some(p) if p.chars().count() < PASSWORD_MIN_CHARS => Err(format!(
                "\"password\" must be at least {} characters long",
                PASSWORD_MIN_CHARS
            )),
            Some(_) => Ok(()),
        }
    }
}

/// `POST /api/login` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}
