use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::workflows::volunteering::domain::{
    Activity, ActivityDraft, ActivityFields, ActivityId, ActivityQuery, ActivityStatus,
    Application, ApplicationId, ApplicationStatus, ApplicationStatusLog, CascadeSummary,
    CategoryId, DeptId, NewApplication, Role, RoleId, StatusEntry, User, UserId,
};
use crate::workflows::volunteering::repository::{RepositoryError, VolunteerStore};
use crate::workflows::volunteering::{Clock, InMemoryVolunteerStore, VolunteerHub};

pub(super) fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 6, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

/// 2030-06-01 09:00, well before every fixture activity.
pub(super) fn opening_day() -> NaiveDateTime {
    at(1, 9, 0)
}

/// Clock the tests move by hand.
#[derive(Debug, Clone)]
pub(super) struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    pub(super) fn starting_at(now: NaiveDateTime) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub(super) fn set(&self, now: NaiveDateTime) {
        *self.0.lock().expect("clock mutex") = now;
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock mutex");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().expect("clock mutex")
    }
}

pub(super) fn draft(title: &str, activity_time: &str, max_people: i64) -> ActivityDraft {
    ActivityDraft {
        dept_id: DeptId(1),
        category_id: CategoryId(1),
        creator_id: UserId(1),
        title: title.to_string(),
        description: format!("{title} volunteers needed"),
        activity_time: activity_time.to_string(),
        location: "Riverside Park".to_string(),
        max_people,
    }
}

pub(super) fn build_hub() -> (Arc<VolunteerHub<InMemoryVolunteerStore>>, ManualClock) {
    build_hub_with(InMemoryVolunteerStore::new())
}

pub(super) fn build_hub_with<S>(store: S) -> (Arc<VolunteerHub<S>>, ManualClock)
where
    S: VolunteerStore + 'static,
{
    let clock = ManualClock::starting_at(opening_day());
    let hub = VolunteerHub::with_clock(Arc::new(store), Arc::new(clock.clone()));
    (Arc::new(hub), clock)
}

pub(super) fn register<S>(hub: &VolunteerHub<S>, username: &str) -> UserId
where
    S: VolunteerStore + 'static,
{
    hub.users
        .register(username, None)
        .expect("user registers")
        .user_id
}

pub(super) fn create<S>(hub: &VolunteerHub<S>, title: &str, time: &str, max_people: i64) -> ActivityId
where
    S: VolunteerStore + 'static,
{
    hub.activities
        .create(draft(title, time, max_people))
        .expect("activity created")
        .activity_id
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// In-memory store that can be taken offline, or made to reject status writes for chosen
/// activities.
#[derive(Debug, Default)]
pub(super) struct FaultyStore {
    inner: InMemoryVolunteerStore,
    offline: AtomicBool,
    failing_status: Mutex<HashSet<ActivityId>>,
}

impl FaultyStore {
    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_status_writes_for(&self, activity: ActivityId) {
        self.failing_status
            .lock()
            .expect("fault mutex")
            .insert(activity);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        Ok(())
    }
}

impl VolunteerStore for FaultyStore {
    fn role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        self.check()?;
        self.inner.role_by_name(name)
    }

    fn insert_user(&self, role_id: RoleId, username: &str) -> Result<User, RepositoryError> {
        self.check()?;
        self.inner.insert_user(role_id, username)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        self.inner.user(id)
    }

    fn activity(&self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        self.check()?;
        self.inner.activity(id)
    }

    fn activities(&self, query: &ActivityQuery) -> Result<Vec<Activity>, RepositoryError> {
        self.check()?;
        self.inner.activities(query)
    }

    fn insert_activity(&self, fields: ActivityFields) -> Result<Activity, RepositoryError> {
        self.check()?;
        self.inner.insert_activity(fields)
    }

    fn replace_activity(
        &self,
        id: ActivityId,
        fields: ActivityFields,
    ) -> Result<Activity, RepositoryError> {
        self.check()?;
        self.inner.replace_activity(id, fields)
    }

    fn set_activity_status(
        &self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        if self
            .failing_status
            .lock()
            .expect("fault mutex")
            .contains(&id)
        {
            return Err(RepositoryError::Unavailable("status write rejected".to_string()));
        }
        self.inner.set_activity_status(id, status)
    }

    fn delete_activity(&self, id: ActivityId) -> Result<CascadeSummary, RepositoryError> {
        self.check()?;
        self.inner.delete_activity(id)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.check()?;
        self.inner.application(id)
    }

    fn application_for(
        &self,
        user: UserId,
        activity: ActivityId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.check()?;
        self.inner.application_for(user, activity)
    }

    fn applications_for_activity(
        &self,
        activity: ActivityId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.check()?;
        self.inner.applications_for_activity(activity)
    }

    fn applications_for_user(&self, user: UserId) -> Result<Vec<Application>, RepositoryError> {
        self.check()?;
        self.inner.applications_for_user(user)
    }

    fn count_applications(
        &self,
        activity: ActivityId,
        status: ApplicationStatus,
    ) -> Result<usize, RepositoryError> {
        self.check()?;
        self.inner.count_applications(activity, status)
    }

    fn insert_application(
        &self,
        application: NewApplication,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError> {
        self.check()?;
        self.inner.insert_application(application, entry)
    }

    fn record_status(
        &self,
        id: ApplicationId,
        entry: StatusEntry,
    ) -> Result<Application, RepositoryError> {
        self.check()?;
        self.inner.record_status(id, entry)
    }

    fn delete_application(&self, id: ApplicationId) -> Result<usize, RepositoryError> {
        self.check()?;
        self.inner.delete_application(id)
    }

    fn status_logs(&self, id: ApplicationId) -> Result<Vec<ApplicationStatusLog>, RepositoryError> {
        self.check()?;
        self.inner.status_logs(id)
    }

    fn with_activity_lock<T, E, F>(&self, activity: ActivityId, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.inner.with_activity_lock(activity, work)
    }
}
