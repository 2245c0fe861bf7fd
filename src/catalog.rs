//! Course and lesson catalog

use serde::{Deserialize, Serialize};

/// A course: an ordered list of lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

/// A lesson within a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,
}

impl Course {
    /// Lesson ids in course order
    pub fn lesson_ids(&self) -> Vec<&str> {
        self.lessons.iter().map(|l| l.id.as_str()).collect()
    }
}
