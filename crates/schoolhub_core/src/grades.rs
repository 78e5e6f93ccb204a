//! crates/schoolhub_core/src/grades.rs
//!
//! Grade aggregation. An ungraded submission is excluded from the mean, never
//! counted as zero, and "no grades at all" is `None` rather than `0.0`.

use futures::future::join_all;
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::Submission;
use crate::ports::{PortError, PortResult, ScopeFilter};
use crate::store::BoundedStore;

/// Unweighted, unrounded arithmetic mean of the graded submissions.
pub fn average_grade(submissions: &[Submission]) -> Option<f64> {
    let (sum, count) = submissions
        .iter()
        .filter_map(|s| s.grade)
        .filter(|g| g.is_finite())
        .fold((0.0_f64, 0_usize), |(sum, count), g| (sum + g, count + 1));

    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseAverage {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub graded_count: usize,
    pub average: Option<f64>,
}

#[derive(Clone)]
pub struct GradeBook {
    store: BoundedStore,
}

impl GradeBook {
    pub fn new(store: BoundedStore) -> Self {
        Self { store }
    }

    /// The student's average over every task attached to the course, either
    /// directly or through one of the course's groups.
    pub async fn course_average(&self, course_id: Uuid, student_id: Uuid) -> PortResult<CourseAverage> {
        self.store
            .call("get_course", |s| s.get_course(course_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;

        let groups = self
            .store
            .call("list_groups_for_course", |s| s.list_groups_for_course(course_id))
            .await?;

        let scopes = std::iter::once(ScopeFilter::course(course_id))
            .chain(groups.iter().map(|g| ScopeFilter::group(g.id)));
        let task_lists = join_all(
            scopes.map(|scope| self.store.call("find_tasks", move |s| s.find_tasks(scope))),
        )
        .await;

        let mut task_ids: HashSet<Uuid> = HashSet::new();
        for tasks in task_lists {
            task_ids.extend(tasks?.into_iter().map(|t| t.id));
        }

        let submissions: Vec<Submission> = self
            .store
            .call("list_submissions_for_student", |s| {
                s.list_submissions_for_student(student_id)
            })
            .await?
            .into_iter()
            .filter(|s| task_ids.contains(&s.task_id))
            .collect();

        Ok(CourseAverage {
            course_id,
            student_id,
            graded_count: submissions.iter().filter(|s| s.grade.is_some()).count(),
            average: average_grade(&submissions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::EntityStore;
    use crate::domain::Task;
    use crate::testing::{bounded, seed_course, seed_group, seed_task};
    use chrono::Utc;
    use std::sync::Arc;

    fn graded(grade: Option<f64>) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            file: None,
            link: Some("https://example.org/work".into()),
            grade,
            grader_comment: None,
            submitted_at: Utc::now(),
            graded_at: None,
            graded_by: None,
        }
    }

    #[test]
    fn empty_input_has_no_average() {
        assert_eq!(average_grade(&[]), None);
        assert_eq!(average_grade(&[graded(None)]), None);
    }

    #[test]
    fn averages_graded_submissions_only() {
        assert_eq!(average_grade(&[graded(Some(80.0)), graded(Some(100.0))]), Some(90.0));
        assert_eq!(average_grade(&[graded(None), graded(Some(70.0))]), Some(70.0));
    }

    #[test]
    fn average_is_not_rounded() {
        let avg = average_grade(&[graded(Some(70.0)), graded(Some(80.0)), graded(Some(81.0))]);
        assert!((avg.unwrap() - 77.0).abs() < 1e-9);
        let avg = average_grade(&[graded(Some(1.0)), graded(Some(2.0)), graded(Some(2.0))]);
        assert!((avg.unwrap() - 5.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn course_average_ignores_other_courses() {
        let store = Arc::new(InMemoryStore::new());
        let math = seed_course(&store, "Math").await;
        let art = seed_course(&store, "Art").await;
        let teacher_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        let math_task = seed_task(&store, Some(math.id), teacher_id, None).await;
        let art_task = seed_task(&store, Some(art.id), teacher_id, None).await;

        for (task_id, grade) in [(math_task.id, 60.0), (art_task.id, 100.0)] {
            let mut submission = graded(None);
            submission.task_id = task_id;
            submission.student_id = student_id;
            let saved = store.upsert_submission(submission).await.unwrap().record;
            store
                .record_grade(saved.id, grade, None, teacher_id, Utc::now())
                .await
                .unwrap();
        }

        let book = GradeBook::new(bounded(&store));
        let result = book.course_average(math.id, student_id).await.unwrap();
        assert_eq!(result.graded_count, 1);
        assert_eq!(result.average, Some(60.0));

        let nobody = book.course_average(math.id, Uuid::new_v4()).await.unwrap();
        assert_eq!(nobody.average, None);
    }

    #[tokio::test]
    async fn course_average_includes_tasks_scoped_to_a_group_of_the_course() {
        let store = Arc::new(InMemoryStore::new());
        let math = seed_course(&store, "Math").await;
        let art = seed_course(&store, "Art").await;
        let math_a = seed_group(&store, math.id, "A").await;
        let art_a = seed_group(&store, art.id, "A").await;
        let teacher_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();

        let now = Utc::now();
        let mut grades = Vec::new();
        for (group_id, grade) in [(math_a.id, 80.0), (art_a.id, 20.0)] {
            let task = store
                .insert_task(Task {
                    id: Uuid::new_v4(),
                    course_id: None,
                    group_id: Some(group_id),
                    teacher_id,
                    title: "Quiz".into(),
                    description: "Chapter 1".into(),
                    deadline: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
            grades.push((task.id, grade));
        }
        let direct = seed_task(&store, Some(math.id), teacher_id, None).await;
        grades.push((direct.id, 100.0));

        for (task_id, grade) in grades {
            let mut submission = graded(None);
            submission.task_id = task_id;
            submission.student_id = student_id;
            let saved = store.upsert_submission(submission).await.unwrap().record;
            store
                .record_grade(saved.id, grade, None, teacher_id, now)
                .await
                .unwrap();
        }

        let result = GradeBook::new(bounded(&store))
            .course_average(math.id, student_id)
            .await
            .unwrap();
        assert_eq!(result.graded_count, 2);
        assert_eq!(result.average, Some(90.0));
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let book = GradeBook::new(bounded(&store));
        assert!(matches!(
            book.course_average(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }
}
