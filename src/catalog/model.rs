use serde::{Deserialize, Serialize};

/// A course record as stored in the catalog and carried in detail replies.
///
/// `id` and `created_at` are assigned once by [`Course::create`] and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl Course {
    pub fn create(input: NewCourse) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: input.title,
            description: input.description,
            category: input.category,
            price: input.price,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Input for course creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
}

/// Filter predicate for course listings. Unset fields match everything and
/// price bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        if let Some(category) = &self.category {
            if &course.category != category {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if course.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if course.price > max {
                return false;
            }
        }
        true
    }
}
