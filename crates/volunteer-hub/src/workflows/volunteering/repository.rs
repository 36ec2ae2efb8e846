use super::domain::{
    Activity, ActivityFields, ActivityId, ActivityQuery, ActivityStatus, Application,
    ApplicationId, ApplicationStatus, ApplicationStatusLog, CascadeSummary, NewApplication, Role,
    RoleId, StatusEntry, User, UserId,
};

/// Persistence port consumed by the catalog, lifecycle, and sweeper services.
///
/// Single-row methods are atomic on their own. Methods that touch more than one table
/// (`insert_application`, `record_status`, `delete_application`, `delete_activity`) are
/// units of work: either every row is written or none is.
pub trait VolunteerStore: Send + Sync {
    fn role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the username is taken.
    fn insert_user(&self, role_id: RoleId, username: &str) -> Result<User, RepositoryError>;
    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    fn activity(&self, id: ActivityId) -> Result<Option<Activity>, RepositoryError>;
    fn activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, RepositoryError>;
    fn insert_activity(&self, fields: ActivityFields) -> Result<Activity, RepositoryError>;
    /// Replaces every editable field, keeping the stored status.
    fn replace_activity(
        &self,
        id: ActivityId,
        fields: ActivityFields,
    ) -> Result<Activity, RepositoryError>;
    fn set_activity_status(
        &self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError>;
    /// Removes the activity's status logs, then its applications, then the activity row.
    fn delete_activity(&self, id: ActivityId) -> Result<CascadeSummary, RepositoryError>;

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn application_for(
        &self,
        user: UserId,
        activity: ActivityId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn applications_for_activity(
        &self,
        activity: ActivityId,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn applications_for_user(&self, user: UserId) -> Result<Vec<Application>, RepositoryError>;
    fn count_applications(
        &self,
        activity: ActivityId,
        status: ApplicationStatus,
    ) -> Result<usize, RepositoryError>;
    /// Creates the application in `entry.status` together with its first audit row.
    fn insert_application(
        &self,
        application: NewApplication,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError>;
    /// Sets the current status and appends the matching audit row.
    fn record_status(
        &self,
        id: ApplicationId,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError>;
    /// Removes the audit trail, then the application. Returns the number of log rows removed.
    fn delete_application(&self, id: ApplicationId) -> Result<usize, RepositoryError>;
    fn status_logs(&self, id: ApplicationId) -> Result<Vec<ApplicationStatusLog>, RepositoryError>;

    /// Runs `work` while holding the exclusive lock for `activity`.
    ///
    /// Every read-count-then-write sequence over an activity's applications must run inside
    /// this boundary so concurrent approvals cannot overshoot the capacity ceiling.
    fn with_activity_lock<T, E, F>(&self, activity: ActivityId, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
