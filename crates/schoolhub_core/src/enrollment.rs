//! crates/schoolhub_core/src/enrollment.rs
//!
//! The enrollment lifecycle: `active -> withdrawn`, nothing else. Withdrawing
//! keeps the record; re-enrolling later creates a new one.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Enrollment, EnrollmentStatus, Role};
use crate::ports::{Clock, EnrollmentFilter, PortError, PortResult};
use crate::store::BoundedStore;

#[derive(Clone)]
pub struct EnrollmentService {
    store: BoundedStore,
    clock: Arc<dyn Clock>,
}

impl EnrollmentService {
    pub fn new(store: BoundedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Enrolls a student in a group.
    ///
    /// The duplicate check and the insert are one atomic store operation, so two
    /// concurrent requests for the same pair cannot both succeed.
    pub async fn enroll(&self, group_id: Uuid, student_id: Uuid) -> PortResult<Enrollment> {
        self.store
            .call("get_group", |s| s.get_group(group_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;

        let student = self
            .store
            .call("get_user", |s| s.get_user(student_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))?;
        if student.role != Role::Student {
            return Err(PortError::InvalidInput(format!(
                "User {} has role {} and cannot be enrolled",
                student_id, student.role
            )));
        }

        let now = self.clock.now();
        let candidate = Enrollment {
            id: Uuid::new_v4(),
            group_id,
            student_id,
            status: EnrollmentStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .call("insert_enrollment_if_absent", |s| {
                s.insert_enrollment_if_absent(candidate)
            })
            .await?
            .ok_or_else(|| {
                PortError::Conflict(format!(
                    "Student {} is already enrolled in group {}",
                    student_id, group_id
                ))
            })?;

        info!(enrollment_id = %created.id, %group_id, %student_id, "Student enrolled");
        Ok(created)
    }

    /// Soft-deletes an enrollment by moving it to `withdrawn`.
    pub async fn withdraw(&self, enrollment_id: Uuid) -> PortResult<Enrollment> {
        let current = self
            .store
            .call("get_enrollment", |s| s.get_enrollment(enrollment_id))
            .await?
            .ok_or_else(|| {
                PortError::NotFound(format!("Enrollment {} not found", enrollment_id))
            })?;
        current.status.withdraw()?;

        // The store re-checks the status, so a concurrent withdrawal loses cleanly.
        let now = self.clock.now();
        let withdrawn = self
            .store
            .call("mark_enrollment_withdrawn", |s| {
                s.mark_enrollment_withdrawn(enrollment_id, now)
            })
            .await?
            .ok_or_else(|| PortError::Conflict("Enrollment is already withdrawn".to_string()))?;

        info!(%enrollment_id, "Enrollment withdrawn");
        Ok(withdrawn)
    }

    /// Lists enrollments. Without an explicit status only active ones are returned.
    pub async fn list(&self, mut filter: EnrollmentFilter) -> PortResult<Vec<Enrollment>> {
        filter.status.get_or_insert(EnrollmentStatus::Active);
        self.store
            .call("find_enrollments", |s| s.find_enrollments(filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::InMemoryStore;
    use crate::testing::{bounded, seed_course, seed_group, seed_user, student, teacher};
    use chrono::{Duration, Utc};

    async fn setup() -> (Arc<InMemoryStore>, EnrollmentService, Uuid, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Math101").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let service = EnrollmentService::new(bounded(&store), Arc::new(FixedClock::new(Utc::now())));
        (store, service, group.id, s1.id)
    }

    #[tokio::test]
    async fn re_enrolling_after_withdrawal_creates_a_second_record() {
        let (_store, service, group_id, student_id) = setup().await;

        let first = service.enroll(group_id, student_id).await.unwrap();
        service.withdraw(first.id).await.unwrap();
        let second = service.enroll(group_id, student_id).await.unwrap();
        assert_ne!(first.id, second.id);

        let history = service
            .list(EnrollmentFilter {
                group_id: Some(group_id),
                student_id: Some(student_id),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(history.len(), 1, "default listing only shows active rows");
        assert_eq!(history[0].id, second.id);

        let withdrawn = service
            .list(EnrollmentFilter {
                group_id: Some(group_id),
                student_id: Some(student_id),
                status: Some(EnrollmentStatus::Withdrawn),
            })
            .await
            .unwrap();
        assert_eq!(withdrawn.len(), 1);
        assert_eq!(withdrawn[0].id, first.id);
    }

    #[tokio::test]
    async fn duplicate_active_enrollment_is_a_conflict() {
        let (_store, service, group_id, student_id) = setup().await;
        service.enroll(group_id, student_id).await.unwrap();

        assert!(matches!(
            service.enroll(group_id, student_id).await,
            Err(PortError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_enrollments_admit_exactly_one() {
        let (_store, service, group_id, student_id) = setup().await;

        let attempts = futures::future::join_all(
            (0..8).map(|_| service.enroll(group_id, student_id)),
        )
        .await;
        assert_eq!(attempts.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn withdrawing_twice_is_a_conflict() {
        let (_store, service, group_id, student_id) = setup().await;
        let enrollment = service.enroll(group_id, student_id).await.unwrap();

        let withdrawn = service.withdraw(enrollment.id).await.unwrap();
        assert_eq!(withdrawn.status, EnrollmentStatus::Withdrawn);
        assert!(matches!(
            service.withdraw(enrollment.id).await,
            Err(PortError::Conflict(_))
        ));
        assert!(matches!(
            service.withdraw(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn withdrawal_is_stamped_with_the_clock() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Bio").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let service = EnrollmentService::new(bounded(&store), clock.clone());

        let enrollment = service.enroll(group.id, s1.id).await.unwrap();
        clock.advance(Duration::days(3));
        let withdrawn = service.withdraw(enrollment.id).await.unwrap();
        assert_eq!(withdrawn.updated_at, enrollment.created_at + Duration::days(3));
    }

    #[tokio::test]
    async fn only_existing_students_can_enroll() {
        let (store, service, group_id, _) = setup().await;
        let t1 = seed_user(&store, teacher("Tomas", "Vera")).await;

        assert!(matches!(
            service.enroll(group_id, t1.id).await,
            Err(PortError::InvalidInput(_))
        ));
        assert!(matches!(
            service.enroll(group_id, Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            service.enroll(Uuid::new_v4(), t1.id).await,
            Err(PortError::NotFound(_))
        ));
    }
}
