//! crates/schoolhub_core/src/roster.rs
//!
//! Resolves the students of a course or group by walking
//! group -> enrollment -> user without relational joins.
//!
//! Broken leaf references (an enrollment pointing at a deleted user, a user who
//! is no longer a student) are logged and omitted. A missing root entity and an
//! unreachable store are errors.

use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Group, Role, User};
use crate::ports::{EnrollmentFilter, PortError, PortResult};
use crate::store::BoundedStore;

/// One roster line: a student in the context of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    pub document_id: Option<String>,
    pub group_id: Uuid,
}

impl StudentSummary {
    fn new(user: &User, group_id: Uuid) -> Self {
        let profile = &user.profile;
        Self {
            id: user.id,
            first_name: profile.first_names.clone().unwrap_or_default().trim().to_string(),
            last_name: profile.last_names.clone().unwrap_or_default().trim().to_string(),
            display_name: user.display_name(),
            email: user.email.clone(),
            document_id: profile.document_number.clone(),
            group_id,
        }
    }
}

#[derive(Clone)]
pub struct RosterAggregator {
    store: BoundedStore,
}

impl RosterAggregator {
    pub fn new(store: BoundedStore) -> Self {
        Self { store }
    }

    /// Every active student of every group of the course, one entry per
    /// (group, student). A student in two groups appears twice.
    pub async fn roster_for_course(&self, course_id: Uuid) -> PortResult<Vec<StudentSummary>> {
        self.store
            .call("get_course", |s| s.get_course(course_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;

        let groups = self
            .store
            .call("list_groups_for_course", |s| s.list_groups_for_course(course_id))
            .await?;
        if groups.is_empty() {
            debug!(%course_id, "Course has no groups; roster is empty");
            return Ok(Vec::new());
        }

        self.aggregate(&groups).await
    }

    pub async fn roster_for_group(&self, group_id: Uuid) -> PortResult<Vec<StudentSummary>> {
        let group = self
            .store
            .call("get_group", |s| s.get_group(group_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;

        self.aggregate(std::slice::from_ref(&group)).await
    }

    async fn aggregate(&self, groups: &[Group]) -> PortResult<Vec<StudentSummary>> {
        // 1. Active members of each group, fetched concurrently.
        let members = join_all(groups.iter().map(|g| self.active_members(g.id)))
            .await
            .into_iter()
            .collect::<PortResult<Vec<_>>>()?;

        // 2. One user lookup per distinct student across all groups.
        let mut seen = HashSet::new();
        let distinct: Vec<Uuid> = members
            .iter()
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let lookups = join_all(distinct.iter().map(|id| self.resolve_student(*id))).await;
        let mut students: HashMap<Uuid, User> = HashMap::with_capacity(distinct.len());
        for (id, lookup) in distinct.iter().zip(lookups) {
            if let Some(user) = lookup? {
                students.insert(*id, user);
            }
        }

        // 3. Assemble per-group entries and sort; completion order never leaks out.
        let mut roster: Vec<(usize, StudentSummary)> = groups
            .iter()
            .zip(&members)
            .enumerate()
            .flat_map(|(position, (group, ids))| {
                ids.iter()
                    .filter_map(|id| students.get(id))
                    .map(move |user| (position, StudentSummary::new(user, group.id)))
                    .collect::<Vec<_>>()
            })
            .collect();
        roster.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| by_display_name(a, b)));

        Ok(roster.into_iter().map(|(_, summary)| summary).collect())
    }

    /// Distinct student ids with an active enrollment in the group, first occurrence wins.
    async fn active_members(&self, group_id: Uuid) -> PortResult<Vec<Uuid>> {
        let enrollments = match self
            .store
            .call("find_enrollments", |s| {
                s.find_enrollments(EnrollmentFilter::active_in_group(group_id))
            })
            .await
        {
            Ok(enrollments) => enrollments,
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                warn!(%group_id, error = %e, "Skipping group whose enrollments could not be read");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        Ok(enrollments
            .into_iter()
            .map(|e| e.student_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    /// `Ok(None)` for anything that should be silently left out of the roster.
    async fn resolve_student(&self, student_id: Uuid) -> PortResult<Option<User>> {
        match self.store.call("get_user", |s| s.get_user(student_id)).await {
            Ok(Some(user)) if user.role == Role::Student => Ok(Some(user)),
            Ok(Some(user)) => {
                debug!(%student_id, role = %user.role, "Enrolled user is not a student; omitted");
                Ok(None)
            }
            Ok(None) => {
                warn!(%student_id, "Enrollment references a missing user; omitted");
                Ok(None)
            }
            Err(e) if e.is_unavailable() => Err(e),
            Err(e) => {
                warn!(%student_id, error = %e, "Student lookup failed; omitted");
                Ok(None)
            }
        }
    }
}

fn by_display_name(a: &StudentSummary, b: &StudentSummary) -> Ordering {
    a.display_name
        .to_lowercase()
        .cmp(&b.display_name.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::EntityStore;
    use crate::testing::{seed_course, seed_enrollment, seed_group, seed_user, student, teacher};
    use std::sync::Arc;
    use std::time::Duration;

    fn aggregator(store: &Arc<InMemoryStore>) -> RosterAggregator {
        let dynamic: Arc<dyn EntityStore> = store.clone();
        RosterAggregator::new(BoundedStore::from(dynamic))
    }

    #[tokio::test]
    async fn course_roster_has_one_entry_per_group_context() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Math101").await;
        let group_a = seed_group(&store, course.id, "A").await;
        let group_b = seed_group(&store, course.id, "B").await;
        let s1 = seed_user(&store, student("Sofia", "Alvarez")).await;
        let s2 = seed_user(&store, student("Bruno", "Diaz")).await;
        seed_enrollment(&store, group_a.id, s1.id).await;
        seed_enrollment(&store, group_a.id, s2.id).await;
        seed_enrollment(&store, group_b.id, s1.id).await;

        let roster = aggregator(&store).roster_for_course(course.id).await.unwrap();

        let lines: Vec<(Uuid, Uuid)> = roster.iter().map(|s| (s.group_id, s.id)).collect();
        assert_eq!(
            lines,
            vec![(group_a.id, s2.id), (group_a.id, s1.id), (group_b.id, s1.id)]
        );
        assert_eq!(roster[0].display_name, "Bruno Diaz");
    }

    #[tokio::test]
    async fn course_without_groups_yields_empty_roster() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Empty").await;

        let roster = aggregator(&store).roster_for_course(course.id).await.unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let roster = aggregator(&store);

        assert!(matches!(
            roster.roster_for_course(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            roster.roster_for_group(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_active_enrollments_collapse_within_a_group() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Bio").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        // Two active rows for the same pair, as left behind by an old racy writer.
        seed_enrollment(&store, group.id, s1.id).await;
        store
            .push_raw_enrollment(crate::testing::active_enrollment(group.id, s1.id))
            .await;

        let roster = aggregator(&store).roster_for_group(group.id).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, s1.id);
    }

    #[tokio::test]
    async fn broken_and_non_student_references_are_omitted() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Art").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let t1 = seed_user(&store, teacher("Tomas", "Vera")).await;
        seed_enrollment(&store, group.id, s1.id).await;
        seed_enrollment(&store, group.id, t1.id).await;
        seed_enrollment(&store, group.id, Uuid::new_v4()).await;

        let roster = aggregator(&store).roster_for_group(group.id).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, s1.id);
    }

    #[tokio::test]
    async fn withdrawn_students_are_not_on_the_roster() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Chem").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let enrollment = seed_enrollment(&store, group.id, s1.id).await;
        store
            .mark_enrollment_withdrawn(enrollment.id, chrono::Utc::now())
            .await
            .unwrap();

        let roster = aggregator(&store).roster_for_group(group.id).await.unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Hist").await;
        let group = seed_group(&store, course.id, "A").await;
        for (first, last) in [("Zoe", "Mora"), ("ana", "Lopez"), ("Luis", "Paz")] {
            let s = seed_user(&store, student(first, last)).await;
            seed_enrollment(&store, group.id, s.id).await;
        }

        let roster = aggregator(&store);
        let first = roster.roster_for_group(group.id).await.unwrap();
        let second = roster.roster_for_group(group.id).await.unwrap();
        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, vec!["ana Lopez", "Luis Paz", "Zoe Mora"]);
    }

    #[tokio::test]
    async fn unavailable_store_is_an_error_not_an_empty_roster() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Geo").await;
        store.set_unavailable(true);

        let result = aggregator(&store).roster_for_course(course.id).await;
        assert!(matches!(result, Err(PortError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn student_lookup_outage_fails_the_whole_roster() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Music").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let s2 = seed_user(&store, student("Bruno", "Diaz")).await;
        seed_enrollment(&store, group.id, s1.id).await;
        seed_enrollment(&store, group.id, s2.id).await;
        store.fail_user_lookup(s2.id, PortError::StoreUnavailable("replica lost".into()));

        let result = aggregator(&store).roster_for_course(course.id).await;
        assert!(matches!(result, Err(PortError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn failed_student_lookup_omits_only_that_student() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Music").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        let s2 = seed_user(&store, student("Bruno", "Diaz")).await;
        seed_enrollment(&store, group.id, s1.id).await;
        seed_enrollment(&store, group.id, s2.id).await;
        store.fail_user_lookup(s2.id, PortError::Unexpected("corrupt row".into()));

        let roster = aggregator(&store).roster_for_group(group.id).await.unwrap();
        let ids: Vec<Uuid> = roster.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![s1.id]);
    }

    #[tokio::test]
    async fn enrollment_read_outage_after_the_root_resolves_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Drama").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        seed_enrollment(&store, group.id, s1.id).await;
        store.fail_on("find_enrollments", PortError::StoreUnavailable("timeout".into()));

        let result = aggregator(&store).roster_for_group(group.id).await;
        assert!(matches!(result, Err(PortError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn unreadable_enrollments_skip_the_group() {
        let store = Arc::new(InMemoryStore::new());
        let course = seed_course(&store, "Drama").await;
        let group = seed_group(&store, course.id, "A").await;
        let s1 = seed_user(&store, student("Ana", "Ruiz")).await;
        seed_enrollment(&store, group.id, s1.id).await;
        store.fail_on("find_enrollments", PortError::Unexpected("bad index".into()));

        let roster = aggregator(&store).roster_for_course(course.id).await.unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_calls_time_out() {
        let store: Arc<dyn EntityStore> =
            Arc::new(InMemoryStore::with_latency(Duration::from_secs(10)));
        let roster = RosterAggregator::new(BoundedStore::new(store, Duration::from_millis(50)));

        let result = roster.roster_for_group(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PortError::StoreUnavailable(_))));
    }
}
