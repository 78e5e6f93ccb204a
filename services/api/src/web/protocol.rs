//! services/api/src/web/protocol.rs
//!
//! Wire types shared by several handler modules, with conversions from the
//! core domain types. Handler-specific requests and responses live next to
//! their handlers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use schoolhub_core::{FileRef, Profile, ScheduleSlot, StudentSummary, Submission, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ProfileBody {
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

impl From<Profile> for ProfileBody {
    fn from(p: Profile) -> Self {
        Self {
            first_names: p.first_names,
            last_names: p.last_names,
            document_type: p.document_type,
            document_number: p.document_number,
            phone: p.phone,
            address: p.address,
            grade_label: p.grade_label,
            section_label: p.section_label,
            birth_date: p.birth_date,
            guardian_name: p.guardian_name,
            guardian_phone: p.guardian_phone,
            academic_title: p.academic_title,
        }
    }
}

impl From<ProfileBody> for Profile {
    fn from(p: ProfileBody) -> Self {
        Self {
            first_names: p.first_names,
            last_names: p.last_names,
            document_type: p.document_type,
            document_number: p.document_number,
            phone: p.phone,
            address: p.address,
            grade_label: p.grade_label,
            section_label: p.section_label,
            birth_date: p.birth_date,
            guardian_name: p.guardian_name,
            guardian_phone: p.guardian_phone,
            academic_title: p.academic_title,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    /// One of STUDENT, TEACHER, ADMIN, UNVERIFIED.
    pub role: String,
    /// One of pending, active, rejected.
    pub status: String,
    pub display_name: String,
    pub profile_complete: bool,
    pub profile: ProfileBody,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name(),
            email: u.email,
            role: u.role.as_str().to_string(),
            status: u.status.as_str().to_string(),
            profile_complete: u.profile_complete,
            profile: u.profile.into(),
            created_at: u.created_at,
        }
    }
}

/// One line of a course or group roster.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct StudentSummaryResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    pub document_id: Option<String>,
    pub group_id: Uuid,
}

impl From<StudentSummary> for StudentSummaryResponse {
    fn from(s: StudentSummary) -> Self {
        Self {
            id: s.id,
            first_name: s.first_name,
            last_name: s.last_name,
            display_name: s.display_name,
            email: s.email,
            document_id: s.document_id,
            group_id: s.group_id,
        }
    }
}

//=========================================================================================
// Embedded Values
//=========================================================================================

/// A reference to a file held by the external file store.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct FileBody {
    pub url: String,
    pub name: Option<String>,
    pub content_type: Option<String>,
}

impl From<FileRef> for FileBody {
    fn from(f: FileRef) -> Self {
        Self {
            url: f.url,
            name: f.name,
            content_type: f.content_type,
        }
    }
}

impl From<FileBody> for FileRef {
    fn from(f: FileBody) -> Self {
        Self {
            url: f.url,
            name: f.name,
            content_type: f.content_type,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ScheduleSlotBody {
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: u8,
    pub room: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<ScheduleSlot> for ScheduleSlotBody {
    fn from(s: ScheduleSlot) -> Self {
        Self {
            weekday: s.weekday,
            room: s.room,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

impl From<ScheduleSlotBody> for ScheduleSlot {
    fn from(s: ScheduleSlotBody) -> Self {
        Self {
            weekday: s.weekday,
            room: s.room,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

//=========================================================================================
// Submissions
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub task_id: Uuid,
    pub student_id: Uuid,
    pub file: Option<FileBody>,
    pub link: Option<String>,
    pub grade: Option<f64>,
    pub grader_comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
}

impl From<Submission> for SubmissionResponse {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            task_id: s.task_id,
            student_id: s.student_id,
            file: s.file.map(FileBody::from),
            link: s.link,
            grade: s.grade,
            grader_comment: s.grader_comment,
            submitted_at: s.submitted_at,
            graded_at: s.graded_at,
            graded_by: s.graded_by,
        }
    }
}
