//! crates/schoolhub_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format; the few
//! that derive serde do so because they are stored as embedded documents.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

//=========================================================================================
// Users & Roles
//=========================================================================================

/// The role a user plays in the school. New accounts start as `Unverified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    Unverified,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
            Role::Unverified => "UNVERIFIED",
        }
    }
}

impl FromStr for Role {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "ADMIN" => Ok(Role::Admin),
            "UNVERIFIED" => Ok(Role::Unverified),
            other => Err(PortError::InvalidInput(format!("Unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Active,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            "rejected" => Ok(AccountStatus::Rejected),
            other => Err(PortError::InvalidInput(format!(
                "Unknown account status '{}'",
                other
            ))),
        }
    }
}

/// Personal details filled in by the user after the account is approved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub grade_label: Option<String>,
    pub section_label: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub academic_title: Option<String>,
}

impl Profile {
    /// First and last names joined by a space and trimmed. Empty when both are absent.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_names.as_deref().unwrap_or("").trim(),
            self.last_names.as_deref().unwrap_or("").trim()
        )
        .trim()
        .to_string()
    }

    /// A profile is complete once names and an identity document are present.
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.first_names) && filled(&self.last_names) && filled(&self.document_number)
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub profile: Profile,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        self.profile.display_name()
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//=========================================================================================
// Courses & Groups
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub grade_label: String,
    pub section_label: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One weekly meeting of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: u8,
    pub room: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A class section of a course, taught by one teacher.
///
/// Membership is not stored here: the enrollment records are the only source
/// of truth for which students belong to a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub schedule: Vec<ScheduleSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Enrollments
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Withdrawn => "withdrawn",
        }
    }

    /// The only transition in the lifecycle: `Active -> Withdrawn`.
    pub fn withdraw(self) -> Result<Self, PortError> {
        match self {
            EnrollmentStatus::Active => Ok(EnrollmentStatus::Withdrawn),
            EnrollmentStatus::Withdrawn => Err(PortError::Conflict(
                "Enrollment is already withdrawn".to_string(),
            )),
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "withdrawn" => Ok(EnrollmentStatus::Withdrawn),
            other => Err(PortError::InvalidInput(format!(
                "Unknown enrollment status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub group_id: Uuid,
    pub student_id: Uuid,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Coursework
//=========================================================================================

/// An assignment. Its active/expired status is derived from `deadline` on read.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reference to an uploaded file held by an external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub name: Option<String>,
    pub content_type: Option<String>,
}

/// A student's work for a task. There is at most one per (task, student).
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: Uuid,
    pub task_id: Uuid,
    pub student_id: Uuid,
    pub file: Option<FileRef>,
    pub link: Option<String>,
    pub grade: Option<f64>,
    pub grader_comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
}

/// Teaching material published to a course or group.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub file: Option<FileRef>,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_trims_and_tolerates_missing_parts() {
        let mut profile = Profile {
            first_names: Some("  Ana ".into()),
            last_names: None,
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "Ana");

        profile.last_names = Some("Ruiz".into());
        assert_eq!(profile.display_name(), "Ana Ruiz");

        assert_eq!(Profile::default().display_name(), "");
    }

    #[test]
    fn enrollment_can_only_be_withdrawn_once() {
        let next = EnrollmentStatus::Active.withdraw().unwrap();
        assert_eq!(next, EnrollmentStatus::Withdrawn);
        assert!(matches!(next.withdraw(), Err(PortError::Conflict(_))));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(Role::Student.to_string(), "STUDENT");
        assert!("PROFESSOR".parse::<Role>().is_err());
    }
}
