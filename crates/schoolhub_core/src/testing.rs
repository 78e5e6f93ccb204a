//! Fixtures shared by the unit tests of this crate.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    AccountStatus, Course, Enrollment, EnrollmentStatus, Group, Profile, Role, Task, User,
};
use crate::memory::InMemoryStore;
use crate::ports::EntityStore;
use crate::store::BoundedStore;

pub fn bounded(store: &Arc<InMemoryStore>) -> BoundedStore {
    let dynamic: Arc<dyn EntityStore> = store.clone();
    BoundedStore::from(dynamic)
}

pub fn user(role: Role, first: &str, last: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}.{}@school.test", first, last).to_lowercase(),
        role,
        status: AccountStatus::Active,
        profile: Profile {
            first_names: Some(first.to_string()),
            last_names: Some(last.to_string()),
            document_number: Some(format!("DOC-{}", &Uuid::new_v4().simple().to_string()[..6])),
            ..Default::default()
        },
        profile_complete: true,
        created_at: Utc::now(),
    }
}

pub fn student(first: &str, last: &str) -> User {
    user(Role::Student, first, last)
}

pub fn teacher(first: &str, last: &str) -> User {
    user(Role::Teacher, first, last)
}

pub fn active_enrollment(group_id: Uuid, student_id: Uuid) -> Enrollment {
    let now = Utc::now();
    Enrollment {
        id: Uuid::new_v4(),
        group_id,
        student_id,
        status: EnrollmentStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

pub async fn seed_user(store: &InMemoryStore, user: User) -> User {
    store
        .create_user_with_credentials(user, "not-a-real-hash")
        .await
        .unwrap()
}

pub async fn seed_course(store: &InMemoryStore, name: &str) -> Course {
    let now = Utc::now();
    store
        .insert_course(Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
            grade_label: "10".into(),
            section_label: "A".into(),
            year: 2024,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

pub async fn seed_group(store: &InMemoryStore, course_id: Uuid, name: &str) -> Group {
    let now = Utc::now();
    store
        .insert_group(Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            course_id,
            teacher_id: Uuid::new_v4(),
            schedule: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

pub async fn seed_enrollment(store: &InMemoryStore, group_id: Uuid, student_id: Uuid) -> Enrollment {
    store
        .insert_enrollment_if_absent(active_enrollment(group_id, student_id))
        .await
        .unwrap()
        .expect("pair already actively enrolled")
}

pub async fn seed_task(
    store: &InMemoryStore,
    course_id: Option<Uuid>,
    teacher_id: Uuid,
    deadline: Option<DateTime<Utc>>,
) -> Task {
    let now = Utc::now();
    store
        .insert_task(Task {
            id: Uuid::new_v4(),
            course_id,
            group_id: None,
            teacher_id,
            title: "Essay".into(),
            description: "Write it".into(),
            deadline,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}
