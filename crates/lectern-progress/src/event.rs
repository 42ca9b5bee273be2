//! Progress events and their persisted form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire name of the only event type the reconciler applies.
pub const LESSON_COMPLETION: &str = "lesson_completion";

/// Discriminator of a buffered event.
///
/// Unknown types are kept verbatim so they survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A lesson was marked complete (or re-marked).
    LessonCompletion,
    /// Anything else; ignored by the reconciler.
    Other(String),
}

impl EventType {
    /// Returns the wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LessonCompletion => LESSON_COMPLETION,
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        if value == LESSON_COMPLETION {
            Self::LessonCompletion
        } else {
            Self::Other(value)
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

/// Derives the composite key naming a lesson within a course.
#[must_use]
pub fn lesson_key(module_id: &str, lesson_id: &str) -> String {
    format!("{module_id}_{lesson_id}")
}

/// A progress change as produced by the UI, before it is buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Learner.
    pub user_id: String,
    /// Course the lesson belongs to.
    pub course_id: String,
    /// Module the lesson belongs to.
    pub module_id: String,
    /// Lesson within the module.
    pub lesson_id: String,
    /// Stable composite lesson identifier within the course.
    pub lesson_key: String,
    /// Completion flag as reported by the UI.
    pub completed: bool,
    /// Event discriminator.
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl ProgressUpdate {
    /// Creates a completed `lesson_completion` update with a derived lesson key.
    #[must_use]
    pub fn lesson_completion(
        user_id: impl Into<String>,
        course_id: impl Into<String>,
        module_id: impl Into<String>,
        lesson_id: impl Into<String>,
    ) -> Self {
        let module_id = module_id.into();
        let lesson_id = lesson_id.into();
        Self {
            user_id: user_id.into(),
            course_id: course_id.into(),
            lesson_key: lesson_key(&module_id, &lesson_id),
            module_id,
            lesson_id,
            completed: true,
            event_type: EventType::LessonCompletion,
        }
    }

    /// Sets the completion flag.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Overrides the derived lesson key.
    #[must_use]
    pub fn with_lesson_key(mut self, lesson_key: impl Into<String>) -> Self {
        self.lesson_key = lesson_key.into();
        self
    }

    /// Overrides the event type.
    #[must_use]
    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    /// Returns the deduplication key for this update.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            user_id: self.user_id.clone(),
            course_id: self.course_id.clone(),
            lesson_key: self.lesson_key.clone(),
        }
    }
}

/// A buffered update, stamped when it entered the local queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProgressEvent {
    /// The buffered change.
    #[serde(flatten)]
    pub update: ProgressUpdate,
    /// Buffering time.
    pub timestamp: DateTime<Utc>,
    /// Position in the queue's recency order. Zero for entries written
    /// before sequence numbers existed.
    #[serde(default)]
    pub sequence: u64,
}

impl PendingProgressEvent {
    /// Returns true if the reconciler applies this event.
    #[must_use]
    pub fn is_lesson_completion(&self) -> bool {
        self.update.event_type == EventType::LessonCompletion
    }
}

/// The `(user, course, lesson)` triple used to collapse repeated events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    /// Learner.
    pub user_id: String,
    /// Course.
    pub course_id: String,
    /// Lesson within the course.
    pub lesson_key: String,
}
