use sled::{Db, Tree};
use tracing::debug;

use crate::catalog::model::{Course, CourseFilter};
use crate::utils::CatalogError;

const COURSES_TREE: &str = "courses";

// sled reports a held file lock as an `Other` I/O error with this message.
const LOCK_CONFLICT: &str = "could not acquire lock";

/// Course store backed by an embedded sled database.
///
/// Records live in the `courses` tree keyed by course id and encoded as JSON.
/// Cloning is cheap and every clone shares the same database handle, so the
/// API path and the detail responder read through one client.
#[derive(Clone)]
pub struct CourseStore {
    db: Db,
    courses: Tree,
}

impl CourseStore {
    /// Opens the database at `path`, taking sled's exclusive lock on it.
    ///
    /// Fails with [`CatalogError::StoreLocked`] while another process (or
    /// another handle in this one) holds the same path.
    pub fn open(path: &str) -> Result<Self, CatalogError> {
        let db = sled::open(path).map_err(|e| match e {
            sled::Error::Io(ref io) if io.to_string().contains(LOCK_CONFLICT) => {
                CatalogError::StoreLocked(path.to_string())
            }
            e => CatalogError::Store(e),
        })?;
        Self::from_db(db)
    }

    /// Opens a throwaway store that is removed when dropped.
    pub fn temporary() -> Result<Self, CatalogError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, CatalogError> {
        let courses = db.open_tree(COURSES_TREE)?;
        Ok(Self { db, courses })
    }

    /// Exact-match lookup by id.
    pub fn find_course(&self, id: &str) -> Result<Course, CatalogError> {
        match self.courses.get(id.as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(CatalogError::NotFound(id.to_string())),
        }
    }

    /// Returns every course matching `filter`, in id order.
    ///
    /// Records that fail to decode are skipped.
    pub fn find_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>, CatalogError> {
        let mut found = Vec::new();
        for entry in self.courses.iter() {
            let (key, raw) = entry?;
            match serde_json::from_slice::<Course>(&raw) {
                Ok(course) if filter.matches(&course) => found.push(course),
                Ok(_) => {}
                Err(e) => debug!(key = %String::from_utf8_lossy(&key), error = %e, "skipping undecodable course"),
            }
        }
        Ok(found)
    }

    pub fn insert_course(&self, course: &Course) -> Result<(), CatalogError> {
        let serialized = serde_json::to_vec(course)?;
        self.courses.insert(course.id.as_bytes(), serialized)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn delete_course(&self, id: &str) -> Result<(), CatalogError> {
        match self.courses.remove(id.as_bytes())? {
            Some(_) => {
                self.db.flush()?;
                Ok(())
            }
            None => Err(CatalogError::NotFound(id.to_string())),
        }
    }
}

impl std::fmt::Debug for CourseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
