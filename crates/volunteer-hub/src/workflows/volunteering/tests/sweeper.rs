use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::common::*;
use crate::workflows::volunteering::domain::{ActivityStatus, ApplicationStatus};
use crate::workflows::volunteering::repository::{RepositoryError, VolunteerStore};
use crate::workflows::volunteering::{SweepReport, MAX_SWEEP_INTERVAL};

#[test]
fn sweep_expires_only_past_due_activities() {
    let (hub, clock) = build_hub();
    let admin = register(&hub, "coordinator");
    let alice = register(&hub, "alice");
    let past = create(&hub, "Morning shift", "2030-06-02 08:00", 3);
    let on_the_dot = create(&hub, "Noon shift", "2030-06-02 12:00", 3);
    let future = create(&hub, "Evening shift", "2030-06-02 18:00", 3);
    let application = hub.applications.apply(alice, past).expect("apply");
    hub.applications
        .update_status(application.application_id, "approved", admin)
        .expect("approve");

    clock.set(at(2, 12, 0));
    let report = hub.sweeper(Duration::from_secs(60)).sweep_once().expect("sweep");

    assert_eq!(
        report,
        SweepReport {
            examined: 3,
            expired: vec![past],
            failed: Vec::new(),
        }
    );
    let status = |id| hub.store().activity(id).expect("lookup").expect("exists").status;
    assert_eq!(status(past), ActivityStatus::Expired);
    assert_eq!(status(on_the_dot), ActivityStatus::Active);
    assert_eq!(status(future), ActivityStatus::Active);

    let untouched = hub
        .store()
        .application(application.application_id)
        .expect("lookup")
        .expect("application survives expiry");
    assert_eq!(untouched.current_status, ApplicationStatus::Approved);
}

#[test]
fn repeated_sweeps_are_idempotent() {
    let (hub, clock) = build_hub();
    let past = create(&hub, "Morning shift", "2030-06-02 08:00", 3);
    clock.set(at(3, 0, 0));
    let sweeper = hub.sweeper(Duration::from_secs(60));

    assert_eq!(sweeper.sweep_once().expect("first").expired, vec![past]);
    let second = sweeper.sweep_once().expect("second");
    assert_eq!(second.examined, 0);
    assert!(second.expired.is_empty());
}

#[test]
fn one_failed_write_does_not_stop_the_batch() {
    let (hub, clock) = build_hub_with(FaultyStore::default());
    let stuck = create(&hub, "Stuck shift", "2030-06-02 08:00", 3);
    let fine = create(&hub, "Fine shift", "2030-06-02 09:00", 3);
    hub.store().fail_status_writes_for(stuck);

    clock.set(at(3, 0, 0));
    let report = hub.sweeper(Duration::from_secs(60)).sweep_once().expect("sweep");

    assert_eq!(report.expired, vec![fine]);
    assert_eq!(report.failed, vec![stuck]);
    assert_eq!(
        hub.store().activity(stuck).expect("lookup").expect("exists").status,
        ActivityStatus::Active
    );
}

#[test]
fn listing_failure_aborts_the_tick() {
    let (hub, _) = build_hub_with(FaultyStore::default());
    hub.store().go_offline();

    let err = hub
        .sweeper(Duration::from_secs(60))
        .sweep_once()
        .expect_err("offline");
    assert!(matches!(err, RepositoryError::Unavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn run_loop_ticks_on_interval_and_stops_on_cancel() {
    let (hub, clock) = build_hub();
    let activity = create(&hub, "Morning shift", "2030-06-02 08:00", 3);
    clock.set(at(2, 8, 1));

    let shutdown = CancellationToken::new();
    let handle = hub.sweeper(Duration::from_secs(60)).spawn(shutdown.clone());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        hub.store().activity(activity).expect("lookup").expect("exists").status,
        ActivityStatus::Active,
        "first tick waits a full interval"
    );

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(
        hub.store().activity(activity).expect("lookup").expect("exists").status,
        ActivityStatus::Expired
    );

    shutdown.cancel();
    handle.await.expect("sweeper task joins after cancel");
}

#[tokio::test(start_paused = true)]
async fn oversized_interval_is_clamped_to_one_day() {
    let (hub, clock) = build_hub();
    let activity = create(&hub, "Morning shift", "2030-06-02 08:00", 3);
    clock.set(at(2, 8, 1));

    let shutdown = CancellationToken::new();
    let handle = hub
        .sweeper(Duration::from_secs(u64::MAX))
        .spawn(shutdown.clone());

    tokio::time::sleep(MAX_SWEEP_INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(
        hub.store().activity(activity).expect("lookup").expect("exists").status,
        ActivityStatus::Expired
    );

    shutdown.cancel();
    handle.await.expect("sweeper survives an oversized interval");
}
