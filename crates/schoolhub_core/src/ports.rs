//! crates/schoolhub_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store and of the system clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AccountStatus, AuthSession, Course, Credentials, Enrollment, EnrollmentStatus, Group,
    Material, Profile, Role, ScheduleSlot, Submission, Task, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether the error means the store itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PortError::StoreUnavailable(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Filters & Write Outcomes
//=========================================================================================

/// Equality filters for enrollment lookups. `None` fields are not constrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrollmentFilter {
    pub group_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
}

impl EnrollmentFilter {
    pub fn active_in_group(group_id: Uuid) -> Self {
        Self {
            group_id: Some(group_id),
            student_id: None,
            status: Some(EnrollmentStatus::Active),
        }
    }
}

/// Equality filters shared by task and material lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

impl ScopeFilter {
    pub fn course(course_id: Uuid) -> Self {
        Self {
            course_id: Some(course_id),
            group_id: None,
        }
    }

    pub fn group(group_id: Uuid) -> Self {
        Self {
            course_id: None,
            group_id: Some(group_id),
        }
    }

    pub fn matches(&self, course_id: Option<Uuid>, group_id: Option<Uuid>) -> bool {
        self.course_id.map_or(true, |c| course_id == Some(c))
            && self.group_id.map_or(true, |g| group_id == Some(g))
    }
}

/// The result of an insert-or-overwrite keyed write.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub record: T,
    pub created: bool,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Typed access to the persisted collections.
///
/// `get_*` calls return `Ok(None)` for a missing document; the core decides whether
/// absence is an error. Errors returned here are reserved for the store itself.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- User Management ---
    async fn get_user(&self, id: Uuid) -> PortResult<Option<User>>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn list_users_by_role(&self, role: Role, status: AccountStatus) -> PortResult<Vec<User>>;

    /// Sets role and/or status. `None` when the user does not exist.
    async fn update_user_access(
        &self,
        id: Uuid,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> PortResult<Option<User>>;

    async fn update_profile(
        &self,
        id: Uuid,
        profile: Profile,
        profile_complete: bool,
    ) -> PortResult<Option<User>>;

    /// Removes the user together with credentials and auth sessions.
    async fn delete_user(&self, id: Uuid) -> PortResult<bool>;

    // --- Auth Methods ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user_with_credentials(
        &self,
        user: User,
        password_hash: &str,
    ) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<Option<Credentials>>;

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()>;

    async fn get_auth_session(&self, session_id: &str) -> PortResult<Option<AuthSession>>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Courses ---
    async fn insert_course(&self, course: Course) -> PortResult<Course>;

    async fn get_course(&self, id: Uuid) -> PortResult<Option<Course>>;

    /// All courses ordered by name.
    async fn list_courses(&self) -> PortResult<Vec<Course>>;

    // --- Groups ---
    async fn insert_group(&self, group: Group) -> PortResult<Group>;

    async fn get_group(&self, id: Uuid) -> PortResult<Option<Group>>;

    /// All groups ordered by name, then id.
    async fn list_groups(&self) -> PortResult<Vec<Group>>;

    /// Groups of one course ordered by name, then id.
    async fn list_groups_for_course(&self, course_id: Uuid) -> PortResult<Vec<Group>>;

    async fn update_group_schedule(
        &self,
        id: Uuid,
        schedule: Vec<ScheduleSlot>,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Group>>;

    // --- Enrollments ---
    /// Atomically inserts the enrollment unless an active one already exists for the
    /// same (group, student) pair, in which case `Ok(None)` is returned.
    async fn insert_enrollment_if_absent(
        &self,
        enrollment: Enrollment,
    ) -> PortResult<Option<Enrollment>>;

    async fn get_enrollment(&self, id: Uuid) -> PortResult<Option<Enrollment>>;

    /// Matching enrollments ordered by creation time, then id.
    async fn find_enrollments(&self, filter: EnrollmentFilter) -> PortResult<Vec<Enrollment>>;

    /// Atomically flips an active enrollment to withdrawn. `None` when the
    /// enrollment is missing or not active.
    async fn mark_enrollment_withdrawn(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Enrollment>>;

    // --- Tasks ---
    async fn insert_task(&self, task: Task) -> PortResult<Task>;

    async fn get_task(&self, id: Uuid) -> PortResult<Option<Task>>;

    async fn find_tasks(&self, filter: ScopeFilter) -> PortResult<Vec<Task>>;

    async fn update_task(&self, task: Task) -> PortResult<Option<Task>>;

    async fn delete_task(&self, id: Uuid) -> PortResult<bool>;

    // --- Submissions ---
    /// Inserts the submission, or overwrites the content of the existing one for the
    /// same (task, student) pair while keeping its id and grade fields.
    async fn upsert_submission(&self, submission: Submission) -> PortResult<Upserted<Submission>>;

    async fn get_submission(&self, id: Uuid) -> PortResult<Option<Submission>>;

    async fn find_submission(
        &self,
        task_id: Uuid,
        student_id: Uuid,
    ) -> PortResult<Option<Submission>>;

    async fn list_submissions_for_task(&self, task_id: Uuid) -> PortResult<Vec<Submission>>;

    async fn list_submissions_for_student(&self, student_id: Uuid) -> PortResult<Vec<Submission>>;

    async fn record_grade(
        &self,
        id: Uuid,
        grade: f64,
        comment: Option<String>,
        graded_by: Uuid,
        graded_at: DateTime<Utc>,
    ) -> PortResult<Option<Submission>>;

    // --- Materials ---
    async fn insert_material(&self, material: Material) -> PortResult<Material>;

    async fn get_material(&self, id: Uuid) -> PortResult<Option<Material>>;

    /// Matching materials, newest first.
    async fn find_materials(&self, filter: ScopeFilter) -> PortResult<Vec<Material>>;

    async fn update_material(&self, material: Material) -> PortResult<Option<Material>>;

    async fn delete_material(&self, id: Uuid) -> PortResult<bool>;
}

/// Supplies the current time. Injected so status derivation stays deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
