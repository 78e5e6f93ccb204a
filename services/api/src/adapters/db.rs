//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `EntityStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The conditional writes the core relies on are enforced by the schema: a partial
//! unique index allows one active enrollment per (group, student), and a unique
//! key on (task, student) turns a resubmission into an in-place update.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use schoolhub_core::domain::{
    AccountStatus, AuthSession, Course, Credentials, Enrollment, EnrollmentStatus, FileRef,
    Group, Material, Profile, Role, ScheduleSlot, Submission, Task, User,
};
use schoolhub_core::ports::{
    EnrollmentFilter, EntityStore, PortError, PortResult, ScopeFilter, Upserted,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `EntityStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool. Acquiring a connection never waits longer than
    /// `acquire_timeout`, so an unreachable database surfaces as an error.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Translates driver errors into port errors. Connectivity problems become
/// `StoreUnavailable`; unique violations become `Conflict`.
fn store_err(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => PortError::StoreUnavailable(e.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, email, role, status, first_names, last_names, document_type, \
     document_number, phone, address, grade_label, section_label, birth_date, guardian_name, \
     guardian_phone, academic_title, profile_complete, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    role: String,
    status: String,
    first_names: Option<String>,
    last_names: Option<String>,
    document_type: Option<String>,
    document_number: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    grade_label: Option<String>,
    section_label: Option<String>,
    birth_date: Option<NaiveDate>,
    guardian_name: Option<String>,
    guardian_phone: Option<String>,
    academic_title: Option<String>,
    profile_complete: bool,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            role: self.role.parse::<Role>().map_err(corrupt)?,
            status: self.status.parse::<AccountStatus>().map_err(corrupt)?,
            profile: Profile {
                first_names: self.first_names,
                last_names: self.last_names,
                document_type: self.document_type,
                document_number: self.document_number,
                phone: self.phone,
                address: self.address,
                grade_label: self.grade_label,
                section_label: self.section_label,
                birth_date: self.birth_date,
                guardian_name: self.guardian_name,
                guardian_phone: self.guardian_phone,
                academic_title: self.academic_title,
            },
            profile_complete: self.profile_complete,
            created_at: self.created_at,
        })
    }
}

/// A stored value that no longer parses is a data problem, not bad client input.
fn corrupt(e: PortError) -> PortError {
    PortError::Unexpected(format!("Corrupt row: {}", e))
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> Credentials {
        Credentials {
            user_id: self.user_id,
            email: self.email,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

const COURSE_COLUMNS: &str = "id, name, grade_label, section_label, year, created_at, updated_at";

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    name: String,
    grade_label: String,
    section_label: String,
    year: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            name: self.name,
            grade_label: self.grade_label,
            section_label: self.section_label,
            year: self.year,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const GROUP_COLUMNS: &str = "id, name, course_id, teacher_id, schedule, created_at, updated_at";

#[derive(FromRow)]
struct GroupRecord {
    id: Uuid,
    name: String,
    course_id: Uuid,
    teacher_id: Uuid,
    schedule: Json<Vec<ScheduleSlot>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl GroupRecord {
    fn to_domain(self) -> Group {
        Group {
            id: self.id,
            name: self.name,
            course_id: self.course_id,
            teacher_id: self.teacher_id,
            schedule: self.schedule.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ENROLLMENT_COLUMNS: &str = "id, group_id, student_id, status, created_at, updated_at";

#[derive(FromRow)]
struct EnrollmentRecord {
    id: Uuid,
    group_id: Uuid,
    student_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl EnrollmentRecord {
    fn to_domain(self) -> PortResult<Enrollment> {
        Ok(Enrollment {
            id: self.id,
            group_id: self.group_id,
            student_id: self.student_id,
            status: self.status.parse::<EnrollmentStatus>().map_err(corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TASK_COLUMNS: &str =
    "id, course_id, group_id, teacher_id, title, description, deadline, created_at, updated_at";

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    course_id: Option<Uuid>,
    group_id: Option<Uuid>,
    teacher_id: Uuid,
    title: String,
    description: String,
    deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl TaskRecord {
    fn to_domain(self) -> Task {
        Task {
            id: self.id,
            course_id: self.course_id,
            group_id: self.group_id,
            teacher_id: self.teacher_id,
            title: self.title,
            description: self.description,
            deadline: self.deadline,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SUBMISSION_COLUMNS: &str = "id, task_id, student_id, file, link, grade, grader_comment, \
     submitted_at, graded_at, graded_by";

#[derive(FromRow)]
struct SubmissionRecord {
    id: Uuid,
    task_id: Uuid,
    student_id: Uuid,
    file: Option<Json<FileRef>>,
    link: Option<String>,
    grade: Option<f64>,
    grader_comment: Option<String>,
    submitted_at: DateTime<Utc>,
    graded_at: Option<DateTime<Utc>>,
    graded_by: Option<Uuid>,
}
impl SubmissionRecord {
    fn to_domain(self) -> Submission {
        Submission {
            id: self.id,
            task_id: self.task_id,
            student_id: self.student_id,
            file: self.file.map(|f| f.0),
            link: self.link,
            grade: self.grade,
            grader_comment: self.grader_comment,
            submitted_at: self.submitted_at,
            graded_at: self.graded_at,
            graded_by: self.graded_by,
        }
    }
}

#[derive(FromRow)]
struct UpsertedSubmissionRecord {
    #[sqlx(flatten)]
    submission: SubmissionRecord,
    created: bool,
}

const MATERIAL_COLUMNS: &str = "id, course_id, group_id, teacher_id, title, description, file, \
     link, created_at, updated_at";

#[derive(FromRow)]
struct MaterialRecord {
    id: Uuid,
    course_id: Option<Uuid>,
    group_id: Option<Uuid>,
    teacher_id: Uuid,
    title: String,
    description: String,
    file: Option<Json<FileRef>>,
    link: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl MaterialRecord {
    fn to_domain(self) -> Material {
        Material {
            id: self.id,
            course_id: self.course_id,
            group_id: self.group_id,
            teacher_id: self.teacher_id,
            title: self.title,
            description: self.description,
            file: self.file.map(|f| f.0),
            link: self.link,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `EntityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EntityStore for PgStore {
    // --- User Management ---

    async fn get_user(&self, id: Uuid) -> PortResult<Option<User>> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(UserRecord::to_domain)
            .transpose()
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(UserRecord::to_domain)
            .collect()
    }

    async fn list_users_by_role(&self, role: Role, status: AccountStatus) -> PortResult<Vec<User>> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE role = $1 AND status = $2 ORDER BY email",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?
        .into_iter()
        .map(UserRecord::to_domain)
        .collect()
    }

    async fn update_user_access(
        &self,
        id: Uuid,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> PortResult<Option<User>> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET role = COALESCE($2, role), status = COALESCE($3, status) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role.map(|r| r.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?
        .map(UserRecord::to_domain)
        .transpose()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: Profile,
        profile_complete: bool,
    ) -> PortResult<Option<User>> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET first_names = $2, last_names = $3, document_type = $4, \
             document_number = $5, phone = $6, address = $7, grade_label = $8, \
             section_label = $9, birth_date = $10, guardian_name = $11, guardian_phone = $12, \
             academic_title = $13, profile_complete = $14 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(profile.first_names)
        .bind(profile.last_names)
        .bind(profile.document_type)
        .bind(profile.document_number)
        .bind(profile.phone)
        .bind(profile.address)
        .bind(profile.grade_label)
        .bind(profile.section_label)
        .bind(profile.birth_date)
        .bind(profile.guardian_name)
        .bind(profile.guardian_phone)
        .bind(profile.academic_title)
        .bind(profile_complete)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?
        .map(UserRecord::to_domain)
        .transpose()
    }

    async fn delete_user(&self, id: Uuid) -> PortResult<bool> {
        // Credentials and auth sessions cascade.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    // --- Auth Methods ---

    async fn create_user_with_credentials(
        &self,
        user: User,
        password_hash: &str,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, role, status, profile_complete, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.profile_complete)
        .bind(user.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match store_err(e) {
            PortError::Conflict(_) => {
                PortError::Conflict(format!("Email {} is already registered", user.email))
            }
            other => other,
        })?;

        sqlx::query("INSERT INTO credentials (user_id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.email)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        record.to_domain()
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<Option<Credentials>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, password_hash FROM credentials WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(CredentialsRecord::to_domain))
    }

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get_auth_session(&self, session_id: &str) -> PortResult<Option<AuthSession>> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(AuthSessionRecord::to_domain))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    // --- Courses ---

    async fn insert_course(&self, course: Course) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "INSERT INTO courses ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {0}",
            COURSE_COLUMNS
        ))
        .bind(course.id)
        .bind(&course.name)
        .bind(&course.grade_label)
        .bind(&course.section_label)
        .bind(course.year)
        .bind(course.created_at)
        .bind(course.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn get_course(&self, id: Uuid) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {} FROM courses ORDER BY name, id",
            COURSE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    // --- Groups ---

    async fn insert_group(&self, group: Group) -> PortResult<Group> {
        let record = sqlx::query_as::<_, GroupRecord>(&format!(
            "INSERT INTO class_groups ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {0}",
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(&group.name)
        .bind(group.course_id)
        .bind(group.teacher_id)
        .bind(Json(&group.schedule))
        .bind(group.created_at)
        .bind(group.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn get_group(&self, id: Uuid) -> PortResult<Option<Group>> {
        let record = sqlx::query_as::<_, GroupRecord>(&format!(
            "SELECT {} FROM class_groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(GroupRecord::to_domain))
    }

    async fn list_groups(&self) -> PortResult<Vec<Group>> {
        let records = sqlx::query_as::<_, GroupRecord>(&format!(
            "SELECT {} FROM class_groups ORDER BY name, id",
            GROUP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(GroupRecord::to_domain).collect())
    }

    async fn list_groups_for_course(&self, course_id: Uuid) -> PortResult<Vec<Group>> {
        let records = sqlx::query_as::<_, GroupRecord>(&format!(
            "SELECT {} FROM class_groups WHERE course_id = $1 ORDER BY name, id",
            GROUP_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(GroupRecord::to_domain).collect())
    }

    async fn update_group_schedule(
        &self,
        id: Uuid,
        schedule: Vec<ScheduleSlot>,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Group>> {
        let record = sqlx::query_as::<_, GroupRecord>(&format!(
            "UPDATE class_groups SET schedule = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(id)
        .bind(Json(schedule))
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(GroupRecord::to_domain))
    }

    // --- Enrollments ---

    async fn insert_enrollment_if_absent(
        &self,
        enrollment: Enrollment,
    ) -> PortResult<Option<Enrollment>> {
        sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "INSERT INTO enrollments ({0}) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (group_id, student_id) WHERE status = 'active' DO NOTHING \
             RETURNING {0}",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment.id)
        .bind(enrollment.group_id)
        .bind(enrollment.student_id)
        .bind(enrollment.status.as_str())
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?
        .map(EnrollmentRecord::to_domain)
        .transpose()
    }

    async fn get_enrollment(&self, id: Uuid) -> PortResult<Option<Enrollment>> {
        sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?
        .map(EnrollmentRecord::to_domain)
        .transpose()
    }

    async fn find_enrollments(&self, filter: EnrollmentFilter) -> PortResult<Vec<Enrollment>> {
        sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments \
             WHERE ($1::uuid IS NULL OR group_id = $1) \
               AND ($2::uuid IS NULL OR student_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at, id",
            ENROLLMENT_COLUMNS
        ))
        .bind(filter.group_id)
        .bind(filter.student_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?
        .into_iter()
        .map(EnrollmentRecord::to_domain)
        .collect()
    }

    async fn mark_enrollment_withdrawn(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Enrollment>> {
        sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "UPDATE enrollments SET status = 'withdrawn', updated_at = $2 \
             WHERE id = $1 AND status = 'active' RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(id)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?
        .map(EnrollmentRecord::to_domain)
        .transpose()
    }

    // --- Tasks ---

    async fn insert_task(&self, task: Task) -> PortResult<Task> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "INSERT INTO tasks ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {0}",
            TASK_COLUMNS
        ))
        .bind(task.id)
        .bind(task.course_id)
        .bind(task.group_id)
        .bind(task.teacher_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn get_task(&self, id: Uuid) -> PortResult<Option<Task>> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(TaskRecord::to_domain))
    }

    async fn find_tasks(&self, filter: ScopeFilter) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {} FROM tasks \
             WHERE ($1::uuid IS NULL OR course_id = $1) \
               AND ($2::uuid IS NULL OR group_id = $2)",
            TASK_COLUMNS
        ))
        .bind(filter.course_id)
        .bind(filter.group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(TaskRecord::to_domain).collect())
    }

    async fn update_task(&self, task: Task) -> PortResult<Option<Task>> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "UPDATE tasks SET title = $2, description = $3, deadline = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(TaskRecord::to_domain))
    }

    async fn delete_task(&self, id: Uuid) -> PortResult<bool> {
        // Submissions cascade.
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    // --- Submissions ---

    async fn upsert_submission(&self, submission: Submission) -> PortResult<Upserted<Submission>> {
        // `xmax = 0` holds only for a row this statement inserted.
        let record = sqlx::query_as::<_, UpsertedSubmissionRecord>(&format!(
            "INSERT INTO submissions ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (task_id, student_id) DO UPDATE SET \
                 file = EXCLUDED.file, link = EXCLUDED.link, submitted_at = EXCLUDED.submitted_at \
             RETURNING {0}, (xmax = 0) AS created",
            SUBMISSION_COLUMNS
        ))
        .bind(submission.id)
        .bind(submission.task_id)
        .bind(submission.student_id)
        .bind(submission.file.map(Json))
        .bind(submission.link)
        .bind(submission.grade)
        .bind(submission.grader_comment)
        .bind(submission.submitted_at)
        .bind(submission.graded_at)
        .bind(submission.graded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(Upserted {
            record: record.submission.to_domain(),
            created: record.created,
        })
    }

    async fn get_submission(&self, id: Uuid) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE id = $1",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    async fn find_submission(
        &self,
        task_id: Uuid,
        student_id: Uuid,
    ) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE task_id = $1 AND student_id = $2",
            SUBMISSION_COLUMNS
        ))
        .bind(task_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    async fn list_submissions_for_task(&self, task_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE task_id = $1 ORDER BY submitted_at, id",
            SUBMISSION_COLUMNS
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(SubmissionRecord::to_domain).collect())
    }

    async fn list_submissions_for_student(&self, student_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE student_id = $1 ORDER BY submitted_at, id",
            SUBMISSION_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(SubmissionRecord::to_domain).collect())
    }

    async fn record_grade(
        &self,
        id: Uuid,
        grade: f64,
        comment: Option<String>,
        graded_by: Uuid,
        graded_at: DateTime<Utc>,
    ) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "UPDATE submissions SET grade = $2, grader_comment = $3, graded_by = $4, graded_at = $5 \
             WHERE id = $1 RETURNING {}",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .bind(grade)
        .bind(comment)
        .bind(graded_by)
        .bind(graded_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    // --- Materials ---

    async fn insert_material(&self, material: Material) -> PortResult<Material> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "INSERT INTO materials ({0}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {0}",
            MATERIAL_COLUMNS
        ))
        .bind(material.id)
        .bind(material.course_id)
        .bind(material.group_id)
        .bind(material.teacher_id)
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.file.map(Json))
        .bind(material.link)
        .bind(material.created_at)
        .bind(material.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn get_material(&self, id: Uuid) -> PortResult<Option<Material>> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM materials WHERE id = $1",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(MaterialRecord::to_domain))
    }

    async fn find_materials(&self, filter: ScopeFilter) -> PortResult<Vec<Material>> {
        let records = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM materials \
             WHERE ($1::uuid IS NULL OR course_id = $1) \
               AND ($2::uuid IS NULL OR group_id = $2) \
             ORDER BY created_at DESC, id",
            MATERIAL_COLUMNS
        ))
        .bind(filter.course_id)
        .bind(filter.group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(MaterialRecord::to_domain).collect())
    }

    async fn update_material(&self, material: Material) -> PortResult<Option<Material>> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "UPDATE materials SET title = $2, description = $3, file = $4, link = $5, \
             updated_at = $6 WHERE id = $1 RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(material.id)
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.file.map(Json))
        .bind(material.link)
        .bind(material.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.map(MaterialRecord::to_domain))
    }

    async fn delete_material(&self, id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }
}
