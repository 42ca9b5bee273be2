//! Remote course-progress documents.
//!
//! One document per `(user, course)` pair lives at
//! `{collection}/{userId}_{courseId}`. Lesson completions are merged into it
//! with array-union semantics, so replaying the same completion is harmless.

use lectern_core::{Document, DocumentPath, Error, FieldValue, Result, WriteBatch};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Collection holding course-progress documents unless configured otherwise.
pub const DEFAULT_PROGRESS_COLLECTION: &str = "userProgress";

/// Field holding the append-only set of completed lesson keys.
pub const COMPLETED_LESSONS_FIELD: &str = "completedLessons";

/// Field stamped with the server time on every progress write.
pub const LAST_ACCESS_FIELD: &str = "lastAccessDate";

/// Field stamped with the server time on every progress write.
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";

/// Returns the document id for a user's progress in a course.
#[must_use]
pub fn progress_document_id(user_id: &str, course_id: &str) -> String {
    format!("{user_id}_{course_id}")
}

/// Returns the path of a user's progress document.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the ids produce an invalid path.
pub fn progress_path(collection: &str, user_id: &str, course_id: &str) -> Result<DocumentPath> {
    DocumentPath::new(collection, progress_document_id(user_id, course_id))
}

/// Stages the merge that records a completed lesson.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the ids produce an invalid path.
pub fn stage_lesson_completion(
    batch: &mut WriteBatch,
    collection: &str,
    user_id: &str,
    course_id: &str,
    lesson_key: &str,
) -> Result<()> {
    let path = progress_path(collection, user_id, course_id)?;
    batch.set_merge(
        path,
        vec![
            ("userId".into(), FieldValue::Value(json!(user_id))),
            ("courseId".into(), FieldValue::Value(json!(course_id))),
            (
                COMPLETED_LESSONS_FIELD.into(),
                FieldValue::ArrayUnion(vec![json!(lesson_key)]),
            ),
            (LAST_ACCESS_FIELD.into(), FieldValue::ServerTimestamp),
            (LAST_UPDATED_FIELD.into(), FieldValue::ServerTimestamp),
        ],
    );
    Ok(())
}

/// Typed view of a course-progress document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    /// Learner.
    #[serde(default)]
    pub user_id: String,
    /// Course.
    #[serde(default)]
    pub course_id: String,
    /// Completed lesson keys, in first-completion order.
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    /// Last time the learner touched the course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_date: Option<String>,
    /// Last time the document changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl CourseProgress {
    /// Decodes a raw document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if a known field has the wrong type.
    pub fn from_document(doc: Document) -> Result<Self> {
        serde_json::from_value(Value::Object(doc)).map_err(|e| Error::Serialization {
            message: format!("course progress document: {e}"),
        })
    }

    /// Returns true if `lesson_key` has been completed.
    #[must_use]
    pub fn is_completed(&self, lesson_key: &str) -> bool {
        self.completed_lessons.iter().any(|k| k == lesson_key)
    }

    /// Completion percentage against `total_lessons`.
    #[must_use]
    pub fn percentage(&self, total_lessons: usize) -> u8 {
        progress_percentage(self.completed_lessons.len(), total_lessons)
    }
}

/// Rounded completion percentage, clamped to 100. Zero lessons yields 0.
#[must_use]
pub fn progress_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    let rounded = (completed * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::WriteOp;

    #[test]
    fn test_percentage_rounds_and_clamps() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(5, 0), 0);
        assert_eq!(progress_percentage(0, 7), 0);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(1, 8), 13);
        assert_eq!(progress_percentage(3, 3), 100);
        assert_eq!(progress_percentage(9, 3), 100);
    }

    #[test]
    fn test_stage_lesson_completion_shape() {
        let mut batch = WriteBatch::new();
        stage_lesson_completion(&mut batch, DEFAULT_PROGRESS_COLLECTION, "u1", "c1", "m1_l1")
            .expect("stage");

        let [WriteOp::Set { path, fields, merge }] = batch.ops() else {
            panic!("expected a single set");
        };
        assert!(*merge);
        assert_eq!(path.to_string(), "userProgress/u1_c1");
        assert!(fields.contains(&(
            COMPLETED_LESSONS_FIELD.to_string(),
            FieldValue::ArrayUnion(vec![json!("m1_l1")])
        )));
        assert!(fields.contains(&(LAST_UPDATED_FIELD.to_string(), FieldValue::ServerTimestamp)));
        assert!(fields.contains(&(LAST_ACCESS_FIELD.to_string(), FieldValue::ServerTimestamp)));
    }

    #[test]
    fn test_invalid_ids_are_rejected() {
        let mut batch = WriteBatch::new();
        assert!(stage_lesson_completion(&mut batch, "userProgress", "a/b", "c", "k").is_err());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_from_document_tolerates_missing_fields() {
        let doc = json!({ "completedLessons": ["a", "b"], "extra": 1 });
        let Value::Object(doc) = doc else { unreachable!() };
        let progress = CourseProgress::from_document(doc).expect("decode");
        assert!(progress.is_completed("a"));
        assert!(!progress.is_completed("c"));
        assert_eq!(progress.percentage(4), 50);
        assert!(progress.last_updated.is_none());
    }
}
