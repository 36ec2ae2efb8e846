use chrono::{Duration, NaiveDateTime};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use volunteer_hub::workflows::volunteering::{
    ActivityDraft, ActivityId, CategoryId, DeptId, InMemoryVolunteerStore, LifecycleError, UserId,
    VolunteerHub,
};

pub(crate) type MemoryHub = VolunteerHub<InMemoryVolunteerStore>;

const ACTIVITY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn memory_hub() -> Arc<MemoryHub> {
    Arc::new(VolunteerHub::new(Arc::new(InMemoryVolunteerStore::new())))
}

/// Records created by [`seed_demo_catalog`].
#[derive(Debug, Clone)]
pub(crate) struct DemoCatalog {
    pub(crate) coordinator: UserId,
    pub(crate) volunteers: Vec<UserId>,
    pub(crate) past_due: ActivityId,
    pub(crate) upcoming: ActivityId,
}

/// One coordinator, `volunteers` applicants, an activity that started an hour ago and one
/// scheduled for tomorrow with `capacity` seats.
pub(crate) fn seed_demo_catalog(
    hub: &MemoryHub,
    now: NaiveDateTime,
    volunteers: usize,
    capacity: i64,
) -> Result<DemoCatalog, LifecycleError> {
    let coordinator = hub.users.register("coordinator", Some("admin"))?.user_id;
    let volunteers = (1..=volunteers)
        .map(|n| {
            hub.users
                .register(&format!("volunteer-{n}"), None)
                .map(|user| user.user_id)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let past_due = hub
        .activities
        .create(demo_draft(
            coordinator,
            "Sunrise beach cleanup",
            now - Duration::hours(1),
            capacity,
        ))?
        .activity_id;
    let upcoming = hub
        .activities
        .create(demo_draft(
            coordinator,
            "Community garden planting",
            now + Duration::days(1),
            capacity,
        ))?
        .activity_id;

    Ok(DemoCatalog {
        coordinator,
        volunteers,
        past_due,
        upcoming,
    })
}

fn demo_draft(
    creator: UserId,
    title: &str,
    when: NaiveDateTime,
    max_people: i64,
) -> ActivityDraft {
    ActivityDraft {
        dept_id: DeptId(1),
        category_id: CategoryId(1),
        creator_id: creator,
        title: title.to_string(),
        description: format!("{title} with the neighbourhood association"),
        activity_time: when.format(ACTIVITY_TIME_FORMAT).to_string(),
        location: "Town square meeting point".to_string(),
        max_people,
    }
}
