use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use super::domain::{
    Activity, ActivityDraft, ActivityFields, ActivityId, ActivityQuery, ApplicationStatus,
    AvailableActivity, CascadeSummary, CategoryId, DeptId, UserId,
};
use super::lifecycle::LifecycleError;
use super::repository::{RepositoryError, VolunteerStore};
use super::schedule::{parse_activity_time, Clock, SystemClock};

/// Activities closer than this to one the user already applied to count as a clash.
const SCHEDULE_CONFLICT_WINDOW_HOURS: i64 = 2;

/// Administrator-facing activity records: creation, edits, cascading deletes, and listings.
pub struct ActivityCatalog<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ActivityCatalog<S>
where
    S: VolunteerStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, draft: ActivityDraft) -> Result<Activity, LifecycleError> {
        let fields = validate_draft(draft)?;
        let activity = self.store.insert_activity(fields)?;
        info!(
            activity_id = activity.activity_id.0,
            title = %activity.title,
            max_people = activity.max_people,
            "activity created"
        );
        Ok(activity)
    }

    /// Full-field replace. The stored status is left untouched.
    pub fn update(
        &self,
        activity_id: ActivityId,
        draft: ActivityDraft,
    ) -> Result<Activity, LifecycleError> {
        let fields = validate_draft(draft)?;
        self.get(activity_id)?;
        let activity = self
            .store
            .with_activity_lock(activity_id, || {
                self.store.replace_activity(activity_id, fields)
            })
            .map_err(|err| not_found_as(err, LifecycleError::ActivityNotFound(activity_id)))?;
        info!(activity_id = activity_id.0, "activity updated");
        Ok(activity)
    }

    /// Delete an activity together with its applications and their audit trails.
    pub fn delete(&self, activity_id: ActivityId) -> Result<CascadeSummary, LifecycleError> {
        self.get(activity_id)?;
        let summary = self
            .store
            .with_activity_lock(activity_id, || self.store.delete_activity(activity_id))
            .map_err(|err| not_found_as(err, LifecycleError::ActivityNotFound(activity_id)))?;
        info!(
            activity_id = activity_id.0,
            applications = summary.applications,
            status_logs = summary.status_logs,
            "activity deleted"
        );
        Ok(summary)
    }

    pub fn get(&self, activity_id: ActivityId) -> Result<Activity, LifecycleError> {
        self.store
            .activity(activity_id)?
            .ok_or(LifecycleError::ActivityNotFound(activity_id))
    }

    /// Active activities, optionally narrowed by department and category, latest first.
    pub fn list(
        &self,
        dept_id: Option<DeptId>,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Activity>, LifecycleError> {
        let query = ActivityQuery {
            dept_id,
            category_id,
            ..ActivityQuery::active()
        };
        self.query_latest_first(&query)
    }

    /// Active activities whose title contains `keyword`, ignoring case, latest first.
    pub fn search(&self, keyword: &str) -> Result<Vec<Activity>, LifecycleError> {
        let query = ActivityQuery {
            title_contains: Some(keyword.to_string()),
            ..ActivityQuery::active()
        };
        self.query_latest_first(&query)
    }

    /// True once the scheduled time has passed or the sweeper has closed the activity.
    pub fn is_expired(&self, activity_id: ActivityId) -> Result<bool, LifecycleError> {
        let activity = self.get(activity_id)?;
        Ok(activity.is_expired(self.clock.now()))
    }

    /// Active activities with free seats that the user has not applied to and that do not
    /// clash with the user's other active activities. Soonest first.
    ///
    /// Free seats are counted against approved applications only, so an activity whose seats
    /// are all requested but not yet approved is still listed.
    pub fn available_for(&self, user_id: UserId) -> Result<Vec<AvailableActivity>, LifecycleError> {
        let active = self.store.activities(&ActivityQuery::active())?;
        let applied: HashSet<ActivityId> = self
            .store
            .applications_for_user(user_id)?
            .into_iter()
            .map(|application| application.activity_id)
            .collect();
        let window = Duration::hours(SCHEDULE_CONFLICT_WINDOW_HOURS);
        let booked: Vec<&Activity> = active
            .iter()
            .filter(|activity| applied.contains(&activity.activity_id))
            .collect();

        let mut available = Vec::new();
        for activity in &active {
            if applied.contains(&activity.activity_id) {
                continue;
            }
            let clashes = booked.iter().any(|other| {
                (activity.activity_time - other.activity_time)
                    .num_seconds()
                    .abs()
                    < window.num_seconds()
            });
            if clashes {
                continue;
            }

            let approved_count = self
                .store
                .count_applications(activity.activity_id, ApplicationStatus::Approved)?;
            let remaining_slots = activity
                .max_people
                .saturating_sub(u32::try_from(approved_count).unwrap_or(u32::MAX));
            if remaining_slots == 0 {
                continue;
            }

            available.push(AvailableActivity {
                activity_id: activity.activity_id,
                title: activity.title.clone(),
                description: activity.description.clone(),
                location: activity.location.clone(),
                activity_time: activity.activity_time,
                max_people: activity.max_people,
                approved_count,
                remaining_slots,
            });
        }
        available.sort_by(|a, b| {
            a.activity_time
                .cmp(&b.activity_time)
                .then(a.activity_id.cmp(&b.activity_id))
        });
        Ok(available)
    }

    fn query_latest_first(&self, query: &ActivityQuery) -> Result<Vec<Activity>, LifecycleError> {
        let mut activities = self.store.activities(query)?;
        activities.sort_by(|a, b| {
            b.activity_time
                .cmp(&a.activity_time)
                .then(b.activity_id.cmp(&a.activity_id))
        });
        Ok(activities)
    }
}

/// Parse and bound-check administrator input before anything is written.
pub fn validate_draft(draft: ActivityDraft) -> Result<ActivityFields, LifecycleError> {
    let activity_time = parse_activity_time(&draft.activity_time).map_err(|source| {
        LifecycleError::InvalidActivityTime {
            raw: draft.activity_time.clone(),
            source,
        }
    })?;
    let max_people = u32::try_from(draft.max_people)
        .ok()
        .filter(|value| *value > 0)
        .ok_or(LifecycleError::InvalidCapacity(draft.max_people))?;

    Ok(ActivityFields {
        dept_id: draft.dept_id,
        category_id: draft.category_id,
        creator_id: draft.creator_id,
        title: draft.title,
        description: draft.description,
        activity_time,
        location: draft.location,
        max_people,
    })
}

fn not_found_as(err: RepositoryError, missing: LifecycleError) -> LifecycleError {
    match err {
        RepositoryError::NotFound => missing,
        other => LifecycleError::Storage(other),
    }
}
