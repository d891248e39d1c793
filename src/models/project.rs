use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::membership::Role;

/// Represents a project as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project together with the caller's role in it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub role: Role,
}

/// Input for creating a project.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_project_dates", skip_on_field_errors = false))]
pub struct ProjectInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Partial update of a project. Absent fields are left unchanged; the dates
/// are cleared by an explicit `null`.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectChanges {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl ProjectChanges {
    /// Applies the changes on top of `project` without touching the store.
    pub fn apply_to(&self, project: &Project) -> Project {
        let mut merged = project.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(start_date) = self.start_date {
            merged.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            merged.end_date = end_date;
        }
        merged
    }
}

/// Data needed to insert a project. The creator becomes its owner.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
}

impl NewProject {
    pub fn new(input: ProjectInput, creator_id: Uuid) -> Self {
        Self {
            name: input.name,
            description: input.description,
            start_date: input.start_date,
            end_date: input.end_date,
            creator_id,
        }
    }
}

/// True when both dates are present and start is not strictly before end.
pub fn dates_out_of_order(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    matches!((start, end), (Some(start), Some(end)) if start >= end)
}

fn validate_project_dates(input: &ProjectInput) -> Result<(), ValidationError> {
    if dates_out_of_order(input.start_date, input.end_date) {
        let mut error = ValidationError::new("date_range");
        error.message = Some(Cow::from("Start date must be before end date"));
        return Err(error);
    }
    Ok(())
}
