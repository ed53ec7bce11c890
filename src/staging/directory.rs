use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use crate::models::{Group, StagingProject, User};
use crate::repo::{GroupRepo, UserRepo};
use crate::staging::StagingError;

/// Group title to group
pub type GroupDirectory = HashMap<String, Group>;

/// User login to user
pub type UserDirectory = HashMap<String, User>;

struct CachedGroups {
    version: i64,
    groups: Arc<GroupDirectory>,
}

/// Process-wide cache of the group directory
///
/// Entries are keyed by the database token and validated against the
/// directory version of that database, so there is no explicit eviction: any
/// group or user change bumps the version and the next lookup rebuilds.
/// Rebuilds happen while holding the lock, so concurrent first lookups build
/// the directory once.
pub struct DirectoryCache {
    entries: Mutex<HashMap<String, CachedGroups>>,
    rebuilds: AtomicUsize,
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// The cache shared by the whole process
    pub fn global() -> &'static DirectoryCache {
        static CACHE: OnceLock<DirectoryCache> = OnceLock::new();
        CACHE.get_or_init(DirectoryCache::new)
    }

    /// All groups keyed by title
    pub fn load_groups(&self, conn: &Connection) -> Result<Arc<GroupDirectory>, StagingError> {
        let token = GroupRepo::database_token(conn)?;
        let version = GroupRepo::directory_version(conn)?;

        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(cached) = entries.get(&token) {
            if cached.version == version {
                return Ok(Arc::clone(&cached.groups));
            }
        }

        let groups: GroupDirectory = GroupRepo::list(conn)?
            .into_iter()
            .map(|group| (group.title.clone(), group))
            .collect();
        let groups = Arc::new(groups);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        log::debug!("Rebuilt group directory ({} groups, version {})", groups.len(), version);

        entries.insert(
            token,
            CachedGroups {
                version,
                groups: Arc::clone(&groups),
            },
        );
        Ok(groups)
    }

    /// Users who authored a review on a request staged in one of `staging_projects`
    ///
    /// Never cached: the input set differs from call to call.
    pub fn load_users(conn: &Connection, staging_projects: &[StagingProject]) -> Result<UserDirectory, StagingError> {
        let ids: Vec<i64> = staging_projects.iter().map(|project| project.project_id).collect();
        let users = UserRepo::review_authors_for_staging_projects(conn, &ids)?
            .into_iter()
            .map(|user| (user.login.clone(), user))
            .collect();
        Ok(users)
    }

    /// Number of directory rebuilds so far
    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }
}
