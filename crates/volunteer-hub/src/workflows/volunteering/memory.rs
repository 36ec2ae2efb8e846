use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::domain::{
    Activity, ActivityFields, ActivityId, ActivityQuery, ActivityStatus, Application,
    ApplicationId, ApplicationStatus, ApplicationStatusLog, CascadeSummary, NewApplication, Role,
    RoleId, StatusEntry, StatusLogId, User, UserId,
};
use super::repository::{RepositoryError, VolunteerStore};

/// Roles every store starts with.
pub const DEFAULT_ROLES: [&str; 2] = ["admin", "user"];

#[derive(Debug, Default)]
struct Tables {
    roles: BTreeMap<RoleId, Role>,
    users: BTreeMap<UserId, User>,
    activities: BTreeMap<ActivityId, Activity>,
    applications: BTreeMap<ApplicationId, Application>,
    status_logs: BTreeMap<StatusLogId, ApplicationStatusLog>,
    next_id: i64,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn append_log(&mut self, application_id: ApplicationId, entry: StatusEntry) {
        let log_id = StatusLogId(self.allocate());
        self.status_logs.insert(
            log_id,
            ApplicationStatusLog {
                log_id,
                application_id,
                handler_id: entry.handler_id,
                log_status: entry.status,
                handle_time: entry.handle_time,
            },
        );
    }

    fn remove_logs_where(&mut self, keep: impl Fn(&ApplicationStatusLog) -> bool) -> usize {
        let before = self.status_logs.len();
        self.status_logs.retain(|_, log| keep(log));
        before - self.status_logs.len()
    }
}

/// Process-local store backing the HTTP service and the test suites.
///
/// All tables sit behind one mutex, so every trait method is trivially atomic. Per-activity
/// locks are kept separately so callers can serialize multi-call sequences.
#[derive(Debug)]
pub struct InMemoryVolunteerStore {
    tables: Mutex<Tables>,
    activity_locks: Mutex<HashMap<ActivityId, Arc<Mutex<()>>>>,
}

impl Default for InMemoryVolunteerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVolunteerStore {
    /// Empty store seeded with the default roles.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for name in DEFAULT_ROLES {
            let role_id = RoleId(tables.allocate());
            tables.roles.insert(
                role_id,
                Role {
                    role_id,
                    role_name: name.to_string(),
                },
            );
        }

        Self {
            tables: Mutex::new(tables),
            activity_locks: Mutex::new(HashMap::new()),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    fn activity_lock(&self, activity: ActivityId) -> Arc<Mutex<()>> {
        let mut locks = self
            .activity_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(activity).or_default().clone()
    }

    /// Drop the lock entry of an activity that does not exist, unless another caller holds it.
    fn release_orphaned_lock(&self, activity: ActivityId, lock: &Arc<Mutex<()>>) {
        let exists = match self.tables() {
            Ok(tables) => tables.activities.contains_key(&activity),
            Err(_) => return,
        };
        if exists {
            return;
        }
        let mut locks = self
            .activity_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under this mutex: the map plus `lock` means no waiters.
        let unshared = locks
            .get(&activity)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2);
        if unshared {
            locks.remove(&activity);
        }
    }
}

impl VolunteerStore for InMemoryVolunteerStore {
    fn role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .roles
            .values()
            .find(|role| role.role_name == name)
            .cloned())
    }

    fn insert_user(&self, role_id: RoleId, username: &str) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.roles.contains_key(&role_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.users.values().any(|user| user.username == username) {
            return Err(RepositoryError::Conflict);
        }
        let user = User {
            user_id: UserId(tables.allocate()),
            role_id,
            username: username.to_string(),
        };
        tables.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    fn activity(&self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        Ok(self.tables()?.activities.get(&id).cloned())
    }

    fn activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .activities
            .values()
            .filter(|activity| query.matches(activity))
            .cloned()
            .collect())
    }

    fn insert_activity(&self, fields: ActivityFields) -> Result<Activity, RepositoryError> {
        let mut tables = self.tables()?;
        let activity = Activity {
            activity_id: ActivityId(tables.allocate()),
            dept_id: fields.dept_id,
            category_id: fields.category_id,
            creator_id: fields.creator_id,
            title: fields.title,
            description: fields.description,
            activity_time: fields.activity_time,
            location: fields.location,
            max_people: fields.max_people,
            status: ActivityStatus::Active,
        };
        tables
            .activities
            .insert(activity.activity_id, activity.clone());
        Ok(activity)
    }

    fn replace_activity(
        &self,
        id: ActivityId,
        fields: ActivityFields,
    ) -> Result<Activity, RepositoryError> {
        let mut tables = self.tables()?;
        let activity = tables
            .activities
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        activity.dept_id = fields.dept_id;
        activity.category_id = fields.category_id;
        activity.creator_id = fields.creator_id;
        activity.title = fields.title;
        activity.description = fields.description;
        activity.activity_time = fields.activity_time;
        activity.location = fields.location;
        activity.max_people = fields.max_people;
        Ok(activity.clone())
    }

    fn set_activity_status(
        &self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let activity = tables
            .activities
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        activity.status = status;
        Ok(())
    }

    fn delete_activity(&self, id: ActivityId) -> Result<CascadeSummary, RepositoryError> {
        let summary = {
            let mut tables = self.tables()?;
            if !tables.activities.contains_key(&id) {
                return Err(RepositoryError::NotFound);
            }

            let doomed: Vec<ApplicationId> = tables
                .applications
                .values()
                .filter(|application| application.activity_id == id)
                .map(|application| application.application_id)
                .collect();
            let status_logs =
                tables.remove_logs_where(|log| !doomed.contains(&log.application_id));
            for application_id in &doomed {
                tables.applications.remove(application_id);
            }
            tables.activities.remove(&id);

            CascadeSummary {
                status_logs,
                applications: doomed.len(),
            }
        };

        self.activity_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(summary)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(&id).cloned())
    }

    fn application_for(
        &self,
        user: UserId,
        activity: ActivityId,
    ) -> Result<Option<Application>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .values()
            .find(|application| application.user_id == user && application.activity_id == activity)
            .cloned())
    }

    fn applications_for_activity(
        &self,
        activity: ActivityId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .values()
            .filter(|application| application.activity_id == activity)
            .cloned()
            .collect())
    }

    fn applications_for_user(&self, user: UserId) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .values()
            .filter(|application| application.user_id == user)
            .cloned()
            .collect())
    }

    fn count_applications(
        &self,
        activity: ActivityId,
        status: ApplicationStatus,
    ) -> Result<usize, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .values()
            .filter(|application| {
                application.activity_id == activity && application.current_status == status
            })
            .count())
    }

    fn insert_application(
        &self,
        application: NewApplication,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let record = Application {
            application_id: ApplicationId(tables.allocate()),
            user_id: application.user_id,
            activity_id: application.activity_id,
            apply_time: application.apply_time,
            current_status: entry.status,
        };
        tables
            .applications
            .insert(record.application_id, record.clone());
        tables.append_log(record.application_id, entry);
        Ok(record)
    }

    fn record_status(
        &self,
        id: ApplicationId,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let application = tables
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        application.current_status = entry.status;
        let updated = application.clone();
        tables.append_log(id, entry);
        Ok(updated)
    }

    fn delete_application(&self, id: ApplicationId) -> Result<usize, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.applications.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        let removed = tables.remove_logs_where(|log| log.application_id != id);
        tables.applications.remove(&id);
        Ok(removed)
    }

    fn status_logs(&self, id: ApplicationId) -> Result<Vec<ApplicationStatusLog>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .status_logs
            .values()
            .filter(|log| log.application_id == id)
            .cloned()
            .collect())
    }

    fn with_activity_lock<T, E, F>(&self, activity: ActivityId, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let lock = self.activity_lock(activity);
        let result = {
            // The mutex guards no data, so a panic in another holder leaves nothing inconsistent.
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };
        self.release_orphaned_lock(activity, &lock);
        result
    }
}
