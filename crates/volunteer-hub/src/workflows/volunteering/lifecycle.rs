use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::domain::{
    ActivityApplicationView, ActivityId, ActivityStatus, Application, ApplicationId,
    ApplicationStatus, ApplicationStatusLog, NewApplication, StatusEntry, UnknownStatus, UserId,
    UserApplicationView,
};
use super::repository::{RepositoryError, VolunteerStore};
use super::schedule::{Clock, SystemClock};

/// Admission, review, and withdrawal of applications, with an audit row for every status write.
pub struct ApplicationLifecycle<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ApplicationLifecycle<S>
where
    S: VolunteerStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Request a seat on an activity. The new application starts out `pending`.
    pub fn apply(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
    ) -> Result<Application, LifecycleError> {
        let now = self.clock.now();

        self.store
            .user(user_id)?
            .ok_or(LifecycleError::UserNotFound(user_id))?;
        self.store
            .activity(activity_id)?
            .ok_or(LifecycleError::ActivityNotFound(activity_id))?;

        let application = self
            .store
            .with_activity_lock(activity_id, || self.admit(user_id, activity_id, now))?;

        info!(
            application_id = application.application_id.0,
            user_id = user_id.0,
            activity_id = activity_id.0,
            "application submitted"
        );
        Ok(application)
    }

    /// Parse a free-form status (case-insensitive, trimmed) and apply it.
    pub fn update_status(
        &self,
        application_id: ApplicationId,
        raw_status: &str,
        handler_id: UserId,
    ) -> Result<Application, LifecycleError> {
        let status = raw_status.parse::<ApplicationStatus>()?;
        self.set_status(application_id, status, handler_id)
    }

    /// Move an application to `status`, re-checking capacity only when entering `approved`.
    pub fn set_status(
        &self,
        application_id: ApplicationId,
        status: ApplicationStatus,
        handler_id: UserId,
    ) -> Result<Application, LifecycleError> {
        let entry = StatusEntry {
            handler_id: Some(handler_id),
            status,
            handle_time: self.clock.now(),
        };
        let existing = self
            .store
            .application(application_id)?
            .ok_or(LifecycleError::ApplicationNotFound(application_id))?;
        let activity_id = existing.activity_id;

        let updated = self.store.with_activity_lock(activity_id, || {
            self.transition(application_id, activity_id, entry)
        });

        match &updated {
            Ok(application) => info!(
                application_id = application_id.0,
                handler_id = handler_id.0,
                status = application.current_status.label(),
                "application status updated"
            ),
            Err(LifecycleError::ActivityFull(_)) => warn!(
                application_id = application_id.0,
                activity_id = activity_id.0,
                "approval refused, activity at capacity"
            ),
            Err(_) => {}
        }
        updated
    }

    /// Withdraw a pending or approved application before its activity starts.
    ///
    /// The audit trail is removed together with the application; no cancellation row is kept.
    pub fn cancel(&self, application_id: ApplicationId) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let existing = self
            .store
            .application(application_id)?
            .ok_or(LifecycleError::ApplicationNotFound(application_id))?;
        let activity_id = existing.activity_id;

        let removed_logs = self.store.with_activity_lock(activity_id, || {
            self.withdraw(application_id, activity_id, now)
        })?;

        info!(
            application_id = application_id.0,
            activity_id = activity_id.0,
            removed_logs,
            "application cancelled"
        );
        Ok(())
    }

    /// Applications for one activity with the applicant's username, newest first.
    pub fn applications_for_activity(
        &self,
        activity_id: ActivityId,
    ) -> Result<Vec<ActivityApplicationView>, LifecycleError> {
        self.store
            .activity(activity_id)?
            .ok_or(LifecycleError::ActivityNotFound(activity_id))?;

        let mut views = Vec::new();
        for application in self.store.applications_for_activity(activity_id)? {
            // Rows whose applicant vanished are dropped, as an inner join would.
            let Some(user) = self.store.user(application.user_id)? else {
                continue;
            };
            views.push(ActivityApplicationView {
                application_id: application.application_id,
                user_id: application.user_id,
                username: user.username,
                apply_time: application.apply_time,
                current_status: application.current_status,
            });
        }
        views.sort_by(|a, b| {
            b.apply_time
                .cmp(&a.apply_time)
                .then(b.application_id.cmp(&a.application_id))
        });
        Ok(views)
    }

    /// Applications submitted by one user with their activity details, newest first.
    pub fn applications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserApplicationView>, LifecycleError> {
        let mut views = Vec::new();
        for application in self.store.applications_for_user(user_id)? {
            let Some(activity) = self.store.activity(application.activity_id)? else {
                continue;
            };
            views.push(UserApplicationView {
                application_id: application.application_id,
                activity_id: activity.activity_id,
                title: activity.title,
                activity_time: activity.activity_time,
                location: activity.location,
                current_status: application.current_status,
                apply_time: application.apply_time,
            });
        }
        views.sort_by(|a, b| {
            b.apply_time
                .cmp(&a.apply_time)
                .then(b.application_id.cmp(&a.application_id))
        });
        Ok(views)
    }

    /// Audit trail of an application, oldest entry first.
    pub fn status_history(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationStatusLog>, LifecycleError> {
        self.store
            .application(application_id)?
            .ok_or(LifecycleError::ApplicationNotFound(application_id))?;
        let mut logs = self.store.status_logs(application_id)?;
        logs.sort_by(|a, b| {
            a.handle_time
                .cmp(&b.handle_time)
                .then(a.log_id.cmp(&b.log_id))
        });
        Ok(logs)
    }

    fn admit(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
        now: NaiveDateTime,
    ) -> Result<Application, LifecycleError> {
        let activity = self
            .store
            .activity(activity_id)?
            .ok_or(LifecycleError::ActivityNotFound(activity_id))?;

        if activity.status != ActivityStatus::Active {
            return Err(LifecycleError::ActivityClosed(activity_id));
        }
        if activity.has_started(now) {
            return Err(LifecycleError::ActivityExpired(activity_id));
        }
        if self.store.application_for(user_id, activity_id)?.is_some() {
            return Err(LifecycleError::AlreadyApplied {
                user_id,
                activity_id,
            });
        }
        self.ensure_capacity(activity_id, activity.max_people)?;

        let application = self.store.insert_application(
            NewApplication {
                user_id,
                activity_id,
                apply_time: now,
            },
            StatusEntry {
                handler_id: Some(user_id),
                status: ApplicationStatus::Pending,
                handle_time: now,
            },
        )?;
        Ok(application)
    }

    fn transition(
        &self,
        application_id: ApplicationId,
        activity_id: ActivityId,
        entry: StatusEntry,
    ) -> Result<Application, LifecycleError> {
        let current = self
            .store
            .application(application_id)?
            .ok_or(LifecycleError::ApplicationNotFound(application_id))?;

        if entry.status == ApplicationStatus::Approved
            && current.current_status != ApplicationStatus::Approved
        {
            let activity = self
                .store
                .activity(activity_id)?
                .ok_or(LifecycleError::ActivityNotFound(activity_id))?;
            self.ensure_capacity(activity_id, activity.max_people)?;
        }

        self.store
            .record_status(application_id, entry)
            .map_err(|err| match err {
                RepositoryError::NotFound => LifecycleError::ApplicationNotFound(application_id),
                other => LifecycleError::Storage(other),
            })
    }

    fn withdraw(
        &self,
        application_id: ApplicationId,
        activity_id: ActivityId,
        now: NaiveDateTime,
    ) -> Result<usize, LifecycleError> {
        let current = self
            .store
            .application(application_id)?
            .ok_or(LifecycleError::ApplicationNotFound(application_id))?;
        let activity = self
            .store
            .activity(activity_id)?
            .ok_or(LifecycleError::ActivityNotFound(activity_id))?;

        if activity.has_started(now) {
            return Err(LifecycleError::ActivityStarted(activity_id));
        }
        if !current.current_status.is_cancellable() {
            return Err(LifecycleError::StatusNotCancellable(current.current_status));
        }

        Ok(self.store.delete_application(application_id)?)
    }

    fn ensure_capacity(
        &self,
        activity_id: ActivityId,
        max_people: u32,
    ) -> Result<(), LifecycleError> {
        let approved = self
            .store
            .count_applications(activity_id, ApplicationStatus::Approved)?;
        if approved >= max_people as usize {
            return Err(LifecycleError::ActivityFull(activity_id));
        }
        Ok(())
    }
}

/// Broad classification callers use to pick a response severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    NotFound,
    Storage,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::BusinessRule => "business_rule",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Error raised by the catalog, lifecycle, and user services.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("user not found")]
    UserNotFound(UserId),
    #[error("activity not found")]
    ActivityNotFound(ActivityId),
    #[error("application not found")]
    ApplicationNotFound(ApplicationId),
    #[error("role '{0}' not found")]
    RoleNotFound(String),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("activity closed")]
    ActivityClosed(ActivityId),
    #[error("activity expired")]
    ActivityExpired(ActivityId),
    #[error("already applied")]
    AlreadyApplied {
        user_id: UserId,
        activity_id: ActivityId,
    },
    #[error("activity full")]
    ActivityFull(ActivityId),
    #[error("invalid status: {0}")]
    InvalidStatus(#[from] UnknownStatus),
    #[error("activity already started, cannot cancel")]
    ActivityStarted(ActivityId),
    #[error("status does not allow cancellation ({0})")]
    StatusNotCancellable(ApplicationStatus),
    #[error("invalid activity time '{raw}'")]
    InvalidActivityTime {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid capacity {0}: max_people must be a positive number")]
    InvalidCapacity(i64),
    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::UserNotFound(_)
            | LifecycleError::ActivityNotFound(_)
            | LifecycleError::ApplicationNotFound(_)
            | LifecycleError::RoleNotFound(_) => ErrorKind::NotFound,
            LifecycleError::EmptyUsername
            | LifecycleError::InvalidStatus(_)
            | LifecycleError::InvalidActivityTime { .. }
            | LifecycleError::InvalidCapacity(_) => ErrorKind::Validation,
            LifecycleError::UsernameTaken(_)
            | LifecycleError::ActivityClosed(_)
            | LifecycleError::ActivityExpired(_)
            | LifecycleError::AlreadyApplied { .. }
            | LifecycleError::ActivityFull(_)
            | LifecycleError::ActivityStarted(_)
            | LifecycleError::StatusNotCancellable(_) => ErrorKind::BusinessRule,
            LifecycleError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_storage(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}
