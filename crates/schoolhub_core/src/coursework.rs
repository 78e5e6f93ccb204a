//! crates/schoolhub_core/src/coursework.rs
//!
//! Tasks, submissions and grading.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Actor, FileRef, Role, Submission, Task, User};
use crate::ports::{Clock, PortError, PortResult, ScopeFilter};
use crate::status::{derive_status, RawTimestamp, TaskStatus};
use crate::store::BoundedStore;

//=========================================================================================
// Inputs & Views
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub deadline: Option<RawTimestamp>,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<RawTimestamp>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskQuery {
    pub scope: ScopeFilter,
    pub status: Option<TaskStatus>,
}

/// A task together with its status as of the moment it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub task: Task,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub file: Option<FileRef>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub created: bool,
}

/// A submission with the student's name and email resolved at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionView {
    pub submission: Submission,
    pub student_name: String,
    pub student_email: String,
}

fn required(field: &str, value: &str) -> PortResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PortError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Only the teacher who owns a record, or an admin, may change it.
pub(crate) fn ensure_owner(actor: &Actor, owner_id: Uuid, what: &str) -> PortResult<()> {
    if actor.is_admin() || actor.id == owner_id {
        Ok(())
    } else {
        Err(PortError::Forbidden(format!("Only the owner may modify this {}", what)))
    }
}

//=========================================================================================
// Service
//=========================================================================================

#[derive(Clone)]
pub struct Coursework {
    store: BoundedStore,
    clock: Arc<dyn Clock>,
}

impl Coursework {
    pub fn new(store: BoundedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn view(&self, task: Task, now: DateTime<Utc>) -> TaskView {
        let status = derive_status(task.deadline, now);
        TaskView { task, status }
    }

    async fn load_task(&self, task_id: Uuid) -> PortResult<Task> {
        self.store
            .call("get_task", |s| s.get_task(task_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))
    }

    /// Checks that the referenced course and group exist and agree. A task scoped
    /// to a group always carries that group's course.
    async fn resolve_scope(
        &self,
        course_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> PortResult<(Option<Uuid>, Option<Uuid>)> {
        if let Some(group_id) = group_id {
            let group = self
                .store
                .call("get_group", |s| s.get_group(group_id))
                .await?
                .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
            if let Some(other) = course_id.filter(|c| *c != group.course_id) {
                return Err(PortError::InvalidInput(format!(
                    "Group {} does not belong to course {}",
                    group_id, other
                )));
            }
            return Ok((Some(group.course_id), Some(group_id)));
        }

        if let Some(course_id) = course_id {
            self.store
                .call("get_course", |s| s.get_course(course_id))
                .await?
                .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;
        }
        Ok((course_id, None))
    }

    // --- Tasks ---

    pub async fn create_task(&self, teacher_id: Uuid, input: NewTask) -> PortResult<TaskView> {
        let title = required("Task title", &input.title)?;
        let description = required("Task description", &input.description)?;
        let deadline = input
            .deadline
            .as_ref()
            .ok_or_else(|| PortError::InvalidInput("Task deadline is required".to_string()))?
            .normalize()?;
        let (course_id, group_id) = self.resolve_scope(input.course_id, input.group_id).await?;

        let now = self.clock.now();
        let task = Task {
            id: Uuid::new_v4(),
            course_id,
            group_id,
            teacher_id,
            title,
            description,
            deadline: Some(deadline),
            created_at: now,
            updated_at: now,
        };
        let task = self.store.call("insert_task", |s| s.insert_task(task)).await?;
        info!(task_id = %task.id, %teacher_id, "Task created");
        Ok(self.view(task, now))
    }

    /// Tasks in scope, earliest deadline first; tasks without a deadline go last.
    pub async fn list_tasks(&self, query: TaskQuery) -> PortResult<Vec<TaskView>> {
        let now = self.clock.now();
        let mut views: Vec<TaskView> = self
            .store
            .call("find_tasks", |s| s.find_tasks(query.scope))
            .await?
            .into_iter()
            .map(|task| self.view(task, now))
            .filter(|view| query.status.map_or(true, |wanted| view.status == wanted))
            .collect();

        views.sort_by(|a, b| match (a.task.deadline, b.task.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.task.id.cmp(&b.task.id)));
        Ok(views)
    }

    pub async fn get_task(&self, task_id: Uuid) -> PortResult<TaskView> {
        let task = self.load_task(task_id).await?;
        Ok(self.view(task, self.clock.now()))
    }

    pub async fn update_task(&self, actor: Actor, task_id: Uuid, patch: TaskPatch) -> PortResult<TaskView> {
        let mut task = self.load_task(task_id).await?;
        ensure_owner(&actor, task.teacher_id, "task")?;

        if let Some(title) = patch.title {
            task.title = required("Task title", &title)?;
        }
        if let Some(description) = patch.description {
            task.description = description.trim().to_string();
        }
        if let Some(deadline) = patch.deadline {
            task.deadline = Some(deadline.normalize()?);
        }
        let now = self.clock.now();
        task.updated_at = now;

        let task = self
            .store
            .call("update_task", |s| s.update_task(task))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
        Ok(self.view(task, now))
    }

    pub async fn delete_task(&self, actor: Actor, task_id: Uuid) -> PortResult<()> {
        let task = self.load_task(task_id).await?;
        ensure_owner(&actor, task.teacher_id, "task")?;
        if !self.store.call("delete_task", |s| s.delete_task(task_id)).await? {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        }
        info!(%task_id, actor = %actor.id, "Task deleted");
        Ok(())
    }

    // --- Submissions ---

    /// Creates or replaces the student's submission for a task.
    ///
    /// A replacement keeps the submission id and any grade already given.
    pub async fn submit(
        &self,
        student_id: Uuid,
        task_id: Uuid,
        input: SubmissionInput,
    ) -> PortResult<SubmissionReceipt> {
        let link = non_blank(input.link);
        if input.file.is_none() && link.is_none() {
            return Err(PortError::InvalidInput(
                "A file or a link is required".to_string(),
            ));
        }

        let task = self.load_task(task_id).await?;
        let now = self.clock.now();
        if derive_status(task.deadline, now) == TaskStatus::Expired {
            return Err(PortError::InvalidInput(format!(
                "The deadline for task {} has passed",
                task_id
            )));
        }

        let draft = Submission {
            id: Uuid::new_v4(),
            task_id,
            student_id,
            file: input.file,
            link,
            grade: None,
            grader_comment: None,
            submitted_at: now,
            graded_at: None,
            graded_by: None,
        };
        let upserted = self
            .store
            .call("upsert_submission", |s| s.upsert_submission(draft))
            .await?;

        info!(
            submission_id = %upserted.record.id,
            %task_id,
            %student_id,
            created = upserted.created,
            "Submission stored"
        );
        Ok(SubmissionReceipt {
            submission: upserted.record,
            created: upserted.created,
        })
    }

    pub async fn my_submission(&self, student_id: Uuid, task_id: Uuid) -> PortResult<Option<Submission>> {
        self.store
            .call("find_submission", |s| s.find_submission(task_id, student_id))
            .await
    }

    /// All submissions for a task, each enriched with the student's name and email.
    /// A student who cannot be resolved leaves the fields empty.
    pub async fn submissions_for_task(&self, task_id: Uuid) -> PortResult<Vec<SubmissionView>> {
        self.load_task(task_id).await?;
        let submissions = self
            .store
            .call("list_submissions_for_task", |s| s.list_submissions_for_task(task_id))
            .await?;

        let mut seen = HashSet::new();
        let student_ids: Vec<Uuid> = submissions
            .iter()
            .map(|s| s.student_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let lookups = join_all(
            student_ids
                .iter()
                .map(|id| self.store.call("get_user", move |s| s.get_user(*id))),
        )
        .await;

        let mut students: HashMap<Uuid, User> = HashMap::new();
        for (id, lookup) in student_ids.iter().zip(lookups) {
            match lookup {
                Ok(Some(user)) => {
                    students.insert(*id, user);
                }
                Ok(None) => warn!(student_id = %id, "Submission references a missing user"),
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => warn!(student_id = %id, error = %e, "Could not resolve submitting student"),
            }
        }

        Ok(submissions
            .into_iter()
            .map(|submission| {
                let student = students.get(&submission.student_id);
                SubmissionView {
                    student_name: student.map(User::display_name).unwrap_or_default(),
                    student_email: student.map(|u| u.email.clone()).unwrap_or_default(),
                    submission,
                }
            })
            .collect())
    }

    /// Records a grade in [0, 100]. Teachers may only grade their own tasks.
    pub async fn grade(
        &self,
        actor: Actor,
        submission_id: Uuid,
        grade: f64,
        comment: Option<String>,
    ) -> PortResult<Submission> {
        if !grade.is_finite() || !(0.0..=100.0).contains(&grade) {
            return Err(PortError::InvalidInput(
                "Grade must be a number between 0 and 100".to_string(),
            ));
        }
        if !matches!(actor.role, Role::Teacher | Role::Admin) {
            return Err(PortError::Forbidden("Only teachers may grade".to_string()));
        }

        let submission = self
            .store
            .call("get_submission", |s| s.get_submission(submission_id))
            .await?
            .ok_or_else(|| {
                PortError::NotFound(format!("Submission {} not found", submission_id))
            })?;

        if !actor.is_admin() {
            match self.store.call("get_task", |s| s.get_task(submission.task_id)).await? {
                Some(task) => ensure_owner(&actor, task.teacher_id, "submission")?,
                None => warn!(task_id = %submission.task_id, "Grading a submission whose task is gone"),
            }
        }

        let now = self.clock.now();
        let graded = self
            .store
            .call("record_grade", |s| {
                s.record_grade(submission_id, grade, non_blank(comment), actor.id, now)
            })
            .await?
            .ok_or_else(|| {
                PortError::NotFound(format!("Submission {} not found", submission_id))
            })?;

        info!(%submission_id, grade, grader = %actor.id, "Submission graded");
        Ok(graded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::InMemoryStore;
    use crate::testing::{
        bounded, seed_course, seed_group, seed_task, seed_user, student, teacher,
    };
    use chrono::{Duration, TimeZone};

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
        coursework: Coursework,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let coursework = Coursework::new(bounded(&store), clock.clone());
        Fixture {
            store,
            clock,
            coursework,
        }
    }

    fn link(url: &str) -> SubmissionInput {
        SubmissionInput {
            file: None,
            link: Some(url.to_string()),
        }
    }

    fn teacher_actor(id: Uuid) -> Actor {
        Actor {
            id,
            role: Role::Teacher,
        }
    }

    #[tokio::test]
    async fn task_creation_validates_and_derives_status() {
        let f = fixture();
        let teacher_id = Uuid::new_v4();

        let missing_title = f
            .coursework
            .create_task(
                teacher_id,
                NewTask {
                    title: "   ".into(),
                    description: "d".into(),
                    deadline: Some(RawTimestamp::Iso("2024-02-01".into())),
                    course_id: None,
                    group_id: None,
                },
            )
            .await;
        assert!(matches!(missing_title, Err(PortError::InvalidInput(_))));

        let bad_deadline = f
            .coursework
            .create_task(
                teacher_id,
                NewTask {
                    title: "Essay".into(),
                    description: "d".into(),
                    deadline: Some(RawTimestamp::Iso("soon".into())),
                    course_id: None,
                    group_id: None,
                },
            )
            .await;
        assert!(matches!(bad_deadline, Err(PortError::InvalidInput(_))));

        let view = f
            .coursework
            .create_task(
                teacher_id,
                NewTask {
                    title: "  Essay ".into(),
                    description: "Write".into(),
                    deadline: Some(RawTimestamp::Epoch {
                        seconds: 1704067200 - 1,
                        nanoseconds: 0,
                    }),
                    course_id: None,
                    group_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(view.task.title, "Essay");
        assert_eq!(view.status, TaskStatus::Expired);
    }

    fn scoped_task(course_id: Option<Uuid>, group_id: Option<Uuid>) -> NewTask {
        NewTask {
            title: "Essay".into(),
            description: "Write".into(),
            deadline: Some(RawTimestamp::Iso("2024-02-01".into())),
            course_id,
            group_id,
        }
    }

    #[tokio::test]
    async fn task_scope_must_exist_and_agree() {
        let f = fixture();
        let teacher_id = Uuid::new_v4();
        let math = seed_course(&f.store, "Math").await;
        let art = seed_course(&f.store, "Art").await;
        let math_a = seed_group(&f.store, math.id, "A").await;

        let unknown_group = f
            .coursework
            .create_task(teacher_id, scoped_task(None, Some(Uuid::new_v4())))
            .await;
        assert!(matches!(unknown_group, Err(PortError::NotFound(_))));

        let unknown_course = f
            .coursework
            .create_task(teacher_id, scoped_task(Some(Uuid::new_v4()), None))
            .await;
        assert!(matches!(unknown_course, Err(PortError::NotFound(_))));

        let mismatched = f
            .coursework
            .create_task(teacher_id, scoped_task(Some(art.id), Some(math_a.id)))
            .await;
        assert!(matches!(mismatched, Err(PortError::InvalidInput(_))));

        // The group's course is filled in when only the group is given.
        let view = f
            .coursework
            .create_task(teacher_id, scoped_task(None, Some(math_a.id)))
            .await
            .unwrap();
        assert_eq!(view.task.course_id, Some(math.id));
        assert_eq!(view.task.group_id, Some(math_a.id));
    }

    #[tokio::test]
    async fn listing_sorts_by_deadline_and_filters_by_status() {
        let f = fixture();
        let now = f.clock.now();
        let teacher_id = Uuid::new_v4();
        let late = seed_task(&f.store, None, teacher_id, Some(now + Duration::days(7))).await;
        let past = seed_task(&f.store, None, teacher_id, Some(now - Duration::days(1))).await;
        let soon = seed_task(&f.store, None, teacher_id, Some(now + Duration::hours(1))).await;
        let open = seed_task(&f.store, None, teacher_id, None).await;

        let all = f.coursework.list_tasks(TaskQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|v| v.task.id).collect();
        assert_eq!(ids, vec![past.id, soon.id, late.id, open.id]);

        let expired = f
            .coursework
            .list_tasks(TaskQuery {
                status: Some(TaskStatus::Expired),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].task.id, past.id);

        f.clock.advance(Duration::days(2));
        let active = f
            .coursework
            .list_tasks(TaskQuery {
                status: Some(TaskStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 2, "soon has expired by now");
    }

    #[tokio::test]
    async fn only_the_owner_or_an_admin_may_edit() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let task = seed_task(&f.store, None, owner, None).await;
        let patch = TaskPatch {
            title: Some("Renamed".into()),
            ..Default::default()
        };

        let stranger = f
            .coursework
            .update_task(teacher_actor(Uuid::new_v4()), task.id, patch.clone())
            .await;
        assert!(matches!(stranger, Err(PortError::Forbidden(_))));

        let admin = Actor {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let updated = f.coursework.update_task(admin, task.id, patch).await.unwrap();
        assert_eq!(updated.task.title, "Renamed");

        f.coursework.delete_task(teacher_actor(owner), task.id).await.unwrap();
        assert!(matches!(
            f.coursework.get_task(task.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resubmission_overwrites_in_place_and_keeps_the_grade() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        let task = seed_task(&f.store, None, owner, Some(f.clock.now() + Duration::days(1))).await;

        let first = f.coursework.submit(student_id, task.id, link("https://a.example")).await.unwrap();
        assert!(first.created);
        f.coursework
            .grade(teacher_actor(owner), first.submission.id, 85.0, Some(" good ".into()))
            .await
            .unwrap();

        let second = f.coursework.submit(student_id, task.id, link("https://b.example")).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.submission.id, first.submission.id);
        assert_eq!(second.submission.link.as_deref(), Some("https://b.example"));
        assert_eq!(second.submission.grade, Some(85.0));
        assert_eq!(second.submission.grader_comment.as_deref(), Some("good"));

        let views = f.coursework.submissions_for_task(task.id).await.unwrap();
        assert_eq!(views.len(), 1);
    }

    #[tokio::test]
    async fn submission_rules() {
        let f = fixture();
        let student_id = Uuid::new_v4();
        let task = seed_task(&f.store, None, Uuid::new_v4(), Some(f.clock.now())).await;

        let empty = f
            .coursework
            .submit(student_id, task.id, SubmissionInput { file: None, link: Some("  ".into()) })
            .await;
        assert!(matches!(empty, Err(PortError::InvalidInput(_))));

        // Deadline equal to now is still open.
        f.coursework.submit(student_id, task.id, link("https://x.example")).await.unwrap();

        f.clock.advance(Duration::seconds(1));
        let late = f.coursework.submit(student_id, task.id, link("https://x.example")).await;
        assert!(matches!(late, Err(PortError::InvalidInput(_))));

        let unknown = f.coursework.submit(student_id, Uuid::new_v4(), link("https://x.example")).await;
        assert!(matches!(unknown, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn grading_enforces_range_and_ownership() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let task = seed_task(&f.store, None, owner, None).await;
        let receipt = f
            .coursework
            .submit(Uuid::new_v4(), task.id, link("https://x.example"))
            .await
            .unwrap();
        let id = receipt.submission.id;

        for bad in [-1.0, 100.5, f64::NAN] {
            assert!(matches!(
                f.coursework.grade(teacher_actor(owner), id, bad, None).await,
                Err(PortError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            f.coursework.grade(teacher_actor(Uuid::new_v4()), id, 50.0, None).await,
            Err(PortError::Forbidden(_))
        ));

        let graded = f.coursework.grade(teacher_actor(owner), id, 100.0, None).await.unwrap();
        assert_eq!(graded.grade, Some(100.0));
        assert_eq!(graded.graded_by, Some(owner));
        assert_eq!(graded.graded_at, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn submission_listing_is_enriched_with_student_details() {
        let f = fixture();
        let s1 = seed_user(&f.store, student("Ana", "Ruiz")).await;
        let t1 = seed_user(&f.store, teacher("Tomas", "Vera")).await;
        let task = seed_task(&f.store, None, t1.id, None).await;
        f.coursework.submit(s1.id, task.id, link("https://a.example")).await.unwrap();
        f.coursework.submit(Uuid::new_v4(), task.id, link("https://b.example")).await.unwrap();

        let views = f.coursework.submissions_for_task(task.id).await.unwrap();
        assert_eq!(views.len(), 2);
        let ana = views.iter().find(|v| v.submission.student_id == s1.id).unwrap();
        assert_eq!(ana.student_name, "Ana Ruiz");
        assert_eq!(ana.student_email, s1.email);
        let ghost = views.iter().find(|v| v.submission.student_id != s1.id).unwrap();
        assert_eq!(ghost.student_name, "");
    }
}
