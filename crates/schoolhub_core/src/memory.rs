//! crates/schoolhub_core/src/memory.rs
//!
//! An in-process implementation of the `EntityStore` port. It backs the test
//! suites and the `memory` store backend of the API service.
//!
//! Each conditional write performs its check and its mutation under a single
//! write lock, so the uniqueness invariants hold under concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AccountStatus, AuthSession, Course, Credentials, Enrollment, EnrollmentStatus, Group,
    Material, Profile, Role, ScheduleSlot, Submission, Task, User,
};
use crate::ports::{
    EnrollmentFilter, EntityStore, PortError, PortResult, ScopeFilter, Upserted,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    credentials: Vec<Credentials>,
    auth_sessions: Vec<AuthSession>,
    courses: Vec<Course>,
    groups: Vec<Group>,
    enrollments: Vec<Enrollment>,
    tasks: Vec<Task>,
    submissions: Vec<Submission>,
    materials: Vec<Material>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    latency: Option<Duration>,
    failing_ops: Mutex<HashMap<&'static str, PortError>>,
    failing_users: Mutex<HashMap<Uuid, PortError>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call, for exercising call timeouts.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Makes every subsequent call fail with `StoreUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Bypasses the uniqueness check, to reproduce rows left behind by older writers.
    #[cfg(test)]
    pub(crate) async fn push_raw_enrollment(&self, enrollment: Enrollment) {
        self.tables.write().await.enrollments.push(enrollment);
    }

    /// Makes every call to the named operation fail with `error`.
    #[cfg(test)]
    pub(crate) fn fail_on(&self, op: &'static str, error: PortError) {
        if let Ok(mut ops) = self.failing_ops.lock() {
            ops.insert(op, error);
        }
    }

    /// Makes `get_user` fail with `error` for this one user only.
    #[cfg(test)]
    pub(crate) fn fail_user_lookup(&self, user_id: Uuid, error: PortError) {
        if let Ok(mut users) = self.failing_users.lock() {
            users.insert(user_id, error);
        }
    }

    async fn gate(&self, op: &'static str) -> PortResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::StoreUnavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        let injected = self
            .failing_ops
            .lock()
            .ok()
            .and_then(|ops| ops.get(op).cloned());
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn by_name_then_id(a: &Group, b: &Group) -> std::cmp::Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

//=========================================================================================
// `EntityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> PortResult<Option<User>> {
        self.gate("get_user").await?;
        let injected = self
            .failing_users
            .lock()
            .ok()
            .and_then(|users| users.get(&id).cloned());
        if let Some(error) = injected {
            return Err(error);
        }
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        self.gate("list_users").await?;
        let t = self.tables.read().await;
        let mut users = t.users.clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn list_users_by_role(&self, role: Role, status: AccountStatus) -> PortResult<Vec<User>> {
        self.gate("list_users_by_role").await?;
        let t = self.tables.read().await;
        let mut users: Vec<User> = t
            .users
            .iter()
            .filter(|u| u.role == role && u.status == status)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn update_user_access(
        &self,
        id: Uuid,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> PortResult<Option<User>> {
        self.gate("update_user_access").await?;
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            if let Some(role) = role {
                u.role = role;
            }
            if let Some(status) = status {
                u.status = status;
            }
            u.clone()
        }))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: Profile,
        profile_complete: bool,
    ) -> PortResult<Option<User>> {
        self.gate("update_profile").await?;
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.profile = profile;
            u.profile_complete = profile_complete;
            u.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> PortResult<bool> {
        self.gate("delete_user").await?;
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        t.credentials.retain(|c| c.user_id != id);
        t.auth_sessions.retain(|s| s.user_id != id);
        Ok(t.users.len() != before)
    }

    async fn create_user_with_credentials(
        &self,
        user: User,
        password_hash: &str,
    ) -> PortResult<User> {
        self.gate("create_user_with_credentials").await?;
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(PortError::Conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }
        t.credentials.push(Credentials {
            user_id: user.id,
            email: user.email.clone(),
            password_hash: password_hash.to_string(),
        });
        t.users.push(user.clone());
        Ok(user)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<Option<Credentials>> {
        self.gate("get_credentials_by_email").await?;
        let t = self.tables.read().await;
        Ok(t.credentials.iter().find(|c| c.email == email).cloned())
    }

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        self.gate("create_auth_session").await?;
        self.tables.write().await.auth_sessions.push(session);
        Ok(())
    }

    async fn get_auth_session(&self, session_id: &str) -> PortResult<Option<AuthSession>> {
        self.gate("get_auth_session").await?;
        let t = self.tables.read().await;
        Ok(t.auth_sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.gate("delete_auth_session").await?;
        self.tables
            .write()
            .await
            .auth_sessions
            .retain(|s| s.id != session_id);
        Ok(())
    }

    async fn insert_course(&self, course: Course) -> PortResult<Course> {
        self.gate("insert_course").await?;
        self.tables.write().await.courses.push(course.clone());
        Ok(course)
    }

    async fn get_course(&self, id: Uuid) -> PortResult<Option<Course>> {
        self.gate("get_course").await?;
        let t = self.tables.read().await;
        Ok(t.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        self.gate("list_courses").await?;
        let mut courses = self.tables.read().await.courses.clone();
        courses.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(courses)
    }

    async fn insert_group(&self, group: Group) -> PortResult<Group> {
        self.gate("insert_group").await?;
        self.tables.write().await.groups.push(group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: Uuid) -> PortResult<Option<Group>> {
        self.gate("get_group").await?;
        let t = self.tables.read().await;
        Ok(t.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn list_groups(&self) -> PortResult<Vec<Group>> {
        self.gate("list_groups").await?;
        let mut groups = self.tables.read().await.groups.clone();
        groups.sort_by(by_name_then_id);
        Ok(groups)
    }

    async fn list_groups_for_course(&self, course_id: Uuid) -> PortResult<Vec<Group>> {
        self.gate("list_groups_for_course").await?;
        let t = self.tables.read().await;
        let mut groups: Vec<Group> = t
            .groups
            .iter()
            .filter(|g| g.course_id == course_id)
            .cloned()
            .collect();
        groups.sort_by(by_name_then_id);
        Ok(groups)
    }

    async fn update_group_schedule(
        &self,
        id: Uuid,
        schedule: Vec<ScheduleSlot>,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Group>> {
        self.gate("update_group_schedule").await?;
        let mut t = self.tables.write().await;
        Ok(t.groups.iter_mut().find(|g| g.id == id).map(|g| {
            g.schedule = schedule;
            g.updated_at = updated_at;
            g.clone()
        }))
    }

    async fn insert_enrollment_if_absent(
        &self,
        enrollment: Enrollment,
    ) -> PortResult<Option<Enrollment>> {
        self.gate("insert_enrollment_if_absent").await?;
        let mut t = self.tables.write().await;
        let duplicate = t.enrollments.iter().any(|e| {
            e.group_id == enrollment.group_id
                && e.student_id == enrollment.student_id
                && e.status == EnrollmentStatus::Active
        });
        if duplicate {
            return Ok(None);
        }
        t.enrollments.push(enrollment.clone());
        Ok(Some(enrollment))
    }

    async fn get_enrollment(&self, id: Uuid) -> PortResult<Option<Enrollment>> {
        self.gate("get_enrollment").await?;
        let t = self.tables.read().await;
        Ok(t.enrollments.iter().find(|e| e.id == id).cloned())
    }

    async fn find_enrollments(&self, filter: EnrollmentFilter) -> PortResult<Vec<Enrollment>> {
        self.gate("find_enrollments").await?;
        let t = self.tables.read().await;
        let mut found: Vec<Enrollment> = t
            .enrollments
            .iter()
            .filter(|e| filter.group_id.map_or(true, |g| e.group_id == g))
            .filter(|e| filter.student_id.map_or(true, |s| e.student_id == s))
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn mark_enrollment_withdrawn(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Option<Enrollment>> {
        self.gate("mark_enrollment_withdrawn").await?;
        let mut t = self.tables.write().await;
        Ok(t.enrollments
            .iter_mut()
            .find(|e| e.id == id && e.status == EnrollmentStatus::Active)
            .map(|e| {
                e.status = EnrollmentStatus::Withdrawn;
                e.updated_at = updated_at;
                e.clone()
            }))
    }

    async fn insert_task(&self, task: Task) -> PortResult<Task> {
        self.gate("insert_task").await?;
        self.tables.write().await.tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> PortResult<Option<Task>> {
        self.gate("get_task").await?;
        let t = self.tables.read().await;
        Ok(t.tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn find_tasks(&self, filter: ScopeFilter) -> PortResult<Vec<Task>> {
        self.gate("find_tasks").await?;
        let t = self.tables.read().await;
        Ok(t.tasks
            .iter()
            .filter(|task| filter.matches(task.course_id, task.group_id))
            .cloned()
            .collect())
    }

    async fn update_task(&self, task: Task) -> PortResult<Option<Task>> {
        self.gate("update_task").await?;
        let mut t = self.tables.write().await;
        Ok(t.tasks.iter_mut().find(|existing| existing.id == task.id).map(|existing| {
            *existing = task;
            existing.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> PortResult<bool> {
        self.gate("delete_task").await?;
        let mut t = self.tables.write().await;
        let before = t.tasks.len();
        t.tasks.retain(|task| task.id != id);
        t.submissions.retain(|s| s.task_id != id);
        Ok(t.tasks.len() != before)
    }

    async fn upsert_submission(&self, submission: Submission) -> PortResult<Upserted<Submission>> {
        self.gate("upsert_submission").await?;
        let mut t = self.tables.write().await;
        if let Some(existing) = t
            .submissions
            .iter_mut()
            .find(|s| s.task_id == submission.task_id && s.student_id == submission.student_id)
        {
            existing.file = submission.file;
            existing.link = submission.link;
            existing.submitted_at = submission.submitted_at;
            return Ok(Upserted {
                record: existing.clone(),
                created: false,
            });
        }
        t.submissions.push(submission.clone());
        Ok(Upserted {
            record: submission,
            created: true,
        })
    }

    async fn get_submission(&self, id: Uuid) -> PortResult<Option<Submission>> {
        self.gate("get_submission").await?;
        let t = self.tables.read().await;
        Ok(t.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_submission(
        &self,
        task_id: Uuid,
        student_id: Uuid,
    ) -> PortResult<Option<Submission>> {
        self.gate("find_submission").await?;
        let t = self.tables.read().await;
        Ok(t.submissions
            .iter()
            .find(|s| s.task_id == task_id && s.student_id == student_id)
            .cloned())
    }

    async fn list_submissions_for_task(&self, task_id: Uuid) -> PortResult<Vec<Submission>> {
        self.gate("list_submissions_for_task").await?;
        let t = self.tables.read().await;
        Ok(t.submissions
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn list_submissions_for_student(&self, student_id: Uuid) -> PortResult<Vec<Submission>> {
        self.gate("list_submissions_for_student").await?;
        let t = self.tables.read().await;
        Ok(t.submissions
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn record_grade(
        &self,
        id: Uuid,
        grade: f64,
        comment: Option<String>,
        graded_by: Uuid,
        graded_at: DateTime<Utc>,
    ) -> PortResult<Option<Submission>> {
        self.gate("record_grade").await?;
        let mut t = self.tables.write().await;
        Ok(t.submissions.iter_mut().find(|s| s.id == id).map(|s| {
            s.grade = Some(grade);
            s.grader_comment = comment;
            s.graded_by = Some(graded_by);
            s.graded_at = Some(graded_at);
            s.clone()
        }))
    }

    async fn insert_material(&self, material: Material) -> PortResult<Material> {
        self.gate("insert_material").await?;
        self.tables.write().await.materials.push(material.clone());
        Ok(material)
    }

    async fn get_material(&self, id: Uuid) -> PortResult<Option<Material>> {
        self.gate("get_material").await?;
        let t = self.tables.read().await;
        Ok(t.materials.iter().find(|m| m.id == id).cloned())
    }

    async fn find_materials(&self, filter: ScopeFilter) -> PortResult<Vec<Material>> {
        self.gate("find_materials").await?;
        let t = self.tables.read().await;
        let mut found: Vec<Material> = t
            .materials
            .iter()
            .filter(|m| filter.matches(m.course_id, m.group_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_material(&self, material: Material) -> PortResult<Option<Material>> {
        self.gate("update_material").await?;
        let mut t = self.tables.write().await;
        Ok(t.materials
            .iter_mut()
            .find(|existing| existing.id == material.id)
            .map(|existing| {
                *existing = material;
                existing.clone()
            }))
    }

    async fn delete_material(&self, id: Uuid) -> PortResult<bool> {
        self.gate("delete_material").await?;
        let mut t = self.tables.write().await;
        let before = t.materials.len();
        t.materials.retain(|m| m.id != id);
        Ok(t.materials.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::active_enrollment;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_enrollments_admit_one_active_row() {
        let store = Arc::new(InMemoryStore::new());
        let group_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert_enrollment_if_absent(active_enrollment(group_id, student_id))
                    .await
            })
        });
        let mut inserted = 0;
        for attempt in futures::future::join_all(attempts).await {
            if attempt.unwrap().unwrap().is_some() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);

        let active = store
            .find_enrollments(EnrollmentFilter {
                group_id: Some(group_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get_course(Uuid::new_v4()).await,
            Err(PortError::StoreUnavailable(_))
        ));
        store.set_unavailable(false);
        assert_eq!(store.get_course(Uuid::new_v4()).await.unwrap(), None);
    }
}
