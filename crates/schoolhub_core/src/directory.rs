//! crates/schoolhub_core/src/directory.rs
//!
//! Courses, groups and the teacher directory.
//!
//! Group listings carry the course name, the teacher's name and email and a
//! student count. None of these are stored on the group; they are resolved
//! every time a view is built, so they can never go stale.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AccountStatus, Course, Group, Role, ScheduleSlot, User};
use crate::ports::{Clock, EnrollmentFilter, PortError, PortResult};
use crate::store::BoundedStore;

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub grade_label: String,
    pub section_label: String,
    pub year: i32,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub schedule: Vec<ScheduleSlot>,
}

/// A group together with the details a listing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupView {
    pub group: Group,
    pub course_name: Option<String>,
    pub teacher_name: Option<String>,
    pub teacher_email: Option<String>,
    pub student_count: usize,
}

/// Rejects slots with a weekday outside 1..=7 or that do not end after they start.
pub fn validate_schedule(schedule: &[ScheduleSlot]) -> PortResult<()> {
    for (index, slot) in schedule.iter().enumerate() {
        if !(1..=7).contains(&slot.weekday) {
            return Err(PortError::InvalidInput(format!(
                "Schedule slot {}: weekday must be between 1 and 7, got {}",
                index, slot.weekday
            )));
        }
        if slot.start_time >= slot.end_time {
            return Err(PortError::InvalidInput(format!(
                "Schedule slot {}: start time must be before end time",
                index
            )));
        }
    }
    Ok(())
}

fn required(field: &str, value: &str) -> PortResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PortError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct GroupDirectory {
    store: BoundedStore,
    clock: Arc<dyn Clock>,
}

impl GroupDirectory {
    pub fn new(store: BoundedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    //=====================================================================================
    // Courses
    //=====================================================================================

    pub async fn create_course(&self, input: NewCourse) -> PortResult<Course> {
        let name = required("Course name", &input.name)?;
        let grade_label = required("Grade", &input.grade_label)?;
        let section_label = required("Section", &input.section_label)?;
        if !(1900..=9999).contains(&input.year) {
            return Err(PortError::InvalidInput(format!(
                "Year {} is out of range",
                input.year
            )));
        }

        let now = self.clock.now();
        let course = Course {
            id: Uuid::new_v4(),
            name,
            grade_label,
            section_label,
            year: input.year,
            created_at: now,
            updated_at: now,
        };
        let course = self.store.call("insert_course", |s| s.insert_course(course)).await?;
        info!(course_id = %course.id, name = %course.name, "Course created");
        Ok(course)
    }

    pub async fn list_courses(&self) -> PortResult<Vec<Course>> {
        self.store.call("list_courses", |s| s.list_courses()).await
    }

    pub async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        self.store
            .call("get_course", |s| s.get_course(course_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))
    }

    //=====================================================================================
    // Groups
    //=====================================================================================

    pub async fn create_group(&self, input: NewGroup) -> PortResult<GroupView> {
        let name = required("Group name", &input.name)?;
        validate_schedule(&input.schedule)?;

        // 1. The course and the teacher must both exist.
        self.get_course(input.course_id).await?;
        let teacher_id = input.teacher_id;
        let teacher = self
            .store
            .call("get_user", |s| s.get_user(teacher_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Teacher {} not found", teacher_id)))?;
        if teacher.role != Role::Teacher {
            return Err(PortError::InvalidInput(format!(
                "User {} is not a teacher",
                teacher_id
            )));
        }

        // 2. Persist and answer with a fresh view.
        let now = self.clock.now();
        let group = Group {
            id: Uuid::new_v4(),
            name,
            course_id: input.course_id,
            teacher_id,
            schedule: input.schedule,
            created_at: now,
            updated_at: now,
        };
        let group = self.store.call("insert_group", |s| s.insert_group(group)).await?;
        info!(group_id = %group.id, course_id = %group.course_id, %teacher_id, "Group created");
        self.view(group).await
    }

    pub async fn update_schedule(
        &self,
        group_id: Uuid,
        schedule: Vec<ScheduleSlot>,
    ) -> PortResult<GroupView> {
        validate_schedule(&schedule)?;
        let now = self.clock.now();
        let group = self
            .store
            .call("update_group_schedule", |s| {
                s.update_group_schedule(group_id, schedule, now)
            })
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        info!(%group_id, slots = group.schedule.len(), "Group schedule updated");
        self.view(group).await
    }

    pub async fn get_view(&self, group_id: Uuid) -> PortResult<GroupView> {
        let group = self
            .store
            .call("get_group", |s| s.get_group(group_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        self.view(group).await
    }

    pub async fn list_views(&self) -> PortResult<Vec<GroupView>> {
        let groups = self.store.call("list_groups", |s| s.list_groups()).await?;
        let views = join_all(groups.into_iter().map(|group| self.view(group))).await;
        views.into_iter().collect()
    }

    /// Resolves the derived fields of a group. A missing course or teacher leaves
    /// the corresponding fields empty; only an unreachable store is an error.
    pub async fn view(&self, group: Group) -> PortResult<GroupView> {
        let (course, teacher, enrollments) = futures::join!(
            self.store.call("get_course", |s| s.get_course(group.course_id)),
            self.store.call("get_user", |s| s.get_user(group.teacher_id)),
            self.store.call("find_enrollments", |s| {
                s.find_enrollments(EnrollmentFilter::active_in_group(group.id))
            }),
        );

        let course = tolerate(course, "course", group.id)?;
        let teacher = tolerate(teacher, "teacher", group.id)?;
        let student_count = tolerate(enrollments.map(Some), "enrollments", group.id)?
            .map(|rows| {
                rows.iter()
                    .map(|e| e.student_id)
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0);

        Ok(GroupView {
            course_name: course.map(|c| c.name),
            teacher_name: teacher.as_ref().map(User::display_name),
            teacher_email: teacher.map(|t| t.email),
            student_count,
            group,
        })
    }

    //=====================================================================================
    // Teachers
    //=====================================================================================

    /// Approved teachers, in the store's user order.
    pub async fn active_teachers(&self) -> PortResult<Vec<User>> {
        self.store
            .call("list_users_by_role", |s| {
                s.list_users_by_role(Role::Teacher, AccountStatus::Active)
            })
            .await
    }
}

fn tolerate<T>(result: PortResult<Option<T>>, what: &str, group_id: Uuid) -> PortResult<Option<T>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_unavailable() => Err(e),
        Err(e) => {
            warn!(%group_id, error = %e, "Could not resolve group {}", what);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::enrollment::EnrollmentService;
    use crate::memory::InMemoryStore;
    use crate::ports::EntityStore;
    use crate::testing::{bounded, seed_course, seed_user, student, teacher, user};
    use chrono::{NaiveTime, Utc};

    fn directory(store: &Arc<InMemoryStore>) -> GroupDirectory {
        GroupDirectory::new(bounded(store), Arc::new(FixedClock::new(Utc::now())))
    }

    fn slot(weekday: u8, start: (u32, u32), end: (u32, u32)) -> ScheduleSlot {
        ScheduleSlot {
            weekday,
            room: "101".into(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn schedule_validation() {
        assert!(validate_schedule(&[slot(1, (8, 0), (9, 30)), slot(7, (10, 0), (11, 0))]).is_ok());
        assert!(validate_schedule(&[slot(0, (8, 0), (9, 0))]).is_err());
        assert!(validate_schedule(&[slot(8, (8, 0), (9, 0))]).is_err());
        assert!(validate_schedule(&[slot(3, (9, 0), (9, 0))]).is_err());
        assert!(validate_schedule(&[slot(3, (10, 0), (9, 0))]).is_err());
    }

    #[tokio::test]
    async fn group_view_is_resolved_at_read_time() {
        let store = Arc::new(InMemoryStore::new());
        let dir = directory(&store);
        let course = seed_course(&store, "Math101").await;
        let t1 = seed_user(&store, teacher("Tomas", "Vera")).await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let s2 = seed_user(&store, student("Bruno", "Diaz")).await;

        let created = dir
            .create_group(NewGroup {
                name: " A ".into(),
                course_id: course.id,
                teacher_id: t1.id,
                schedule: vec![slot(2, (8, 0), (9, 0))],
            })
            .await
            .unwrap();
        assert_eq!(created.group.name, "A");
        assert_eq!(created.course_name.as_deref(), Some("Math101"));
        assert_eq!(created.teacher_name.as_deref(), Some("Tomas Vera"));
        assert_eq!(created.student_count, 0);

        let enrollments = EnrollmentService::new(bounded(&store), Arc::new(FixedClock::new(Utc::now())));
        enrollments.enroll(created.group.id, s1.id).await.unwrap();
        let e2 = enrollments.enroll(created.group.id, s2.id).await.unwrap();
        assert_eq!(dir.get_view(created.group.id).await.unwrap().student_count, 2);

        enrollments.withdraw(e2.id).await.unwrap();
        let views = dir.list_views().await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].student_count, 1);
    }

    #[tokio::test]
    async fn group_creation_checks_references() {
        let store = Arc::new(InMemoryStore::new());
        let dir = directory(&store);
        let course = seed_course(&store, "Math101").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;

        let new_group = |course_id, teacher_id| NewGroup {
            name: "A".into(),
            course_id,
            teacher_id,
            schedule: Vec::new(),
        };

        assert!(matches!(
            dir.create_group(new_group(course.id, s1.id)).await,
            Err(PortError::InvalidInput(_))
        ));
        assert!(matches!(
            dir.create_group(new_group(Uuid::new_v4(), s1.id)).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            dir.create_group(new_group(course.id, Uuid::new_v4())).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn schedule_update_validates_and_persists() {
        let store = Arc::new(InMemoryStore::new());
        let dir = directory(&store);
        let course = seed_course(&store, "Math101").await;
        let t1 = seed_user(&store, teacher("Tomas", "Vera")).await;
        let view = dir
            .create_group(NewGroup {
                name: "A".into(),
                course_id: course.id,
                teacher_id: t1.id,
                schedule: Vec::new(),
            })
            .await
            .unwrap();

        assert!(matches!(
            dir.update_schedule(view.group.id, vec![slot(9, (8, 0), (9, 0))]).await,
            Err(PortError::InvalidInput(_))
        ));
        let updated = dir
            .update_schedule(view.group.id, vec![slot(5, (13, 0), (14, 30))])
            .await
            .unwrap();
        assert_eq!(updated.group.schedule.len(), 1);
        assert!(matches!(
            dir.update_schedule(Uuid::new_v4(), Vec::new()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn course_creation_requires_fields() {
        let store = Arc::new(InMemoryStore::new());
        let dir = directory(&store);
        let bad = dir
            .create_course(NewCourse {
                name: "".into(),
                grade_label: "10".into(),
                section_label: "A".into(),
                year: 2024,
            })
            .await;
        assert!(matches!(bad, Err(PortError::InvalidInput(_))));

        let course = dir
            .create_course(NewCourse {
                name: "Physics".into(),
                grade_label: "11".into(),
                section_label: "B".into(),
                year: 2025,
            })
            .await
            .unwrap();
        assert_eq!(dir.list_courses().await.unwrap(), vec![course]);
    }

    #[tokio::test]
    async fn only_approved_teachers_are_listed() {
        let store = Arc::new(InMemoryStore::new());
        let dir = directory(&store);
        let active = seed_user(&store, teacher("Tomas", "Vera")).await;
        let pending = seed_user(&store, teacher("Paula", "Soto")).await;
        store
            .update_user_access(pending.id, None, Some(AccountStatus::Pending))
            .await
            .unwrap();
        seed_user(&store, user(Role::Admin, "Ada", "Root")).await;

        let teachers = dir.active_teachers().await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].id, active.id);
    }
}
