use crate::infra::{memory_hub, seed_demo_catalog, DemoCatalog, MemoryHub};
use crate::server::shutdown_signal;
use clap::Args;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use volunteer_hub::config::AppConfig;
use volunteer_hub::error::AppError;
use volunteer_hub::telemetry;
use volunteer_hub::workflows::volunteering::{
    ActivityId, ApplicationStatus, Clock, LifecycleError, SweepReport, SystemClock,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seats on the demo activity
    #[arg(long, default_value_t = 2)]
    pub(crate) capacity: i64,
    /// Number of volunteers who apply
    #[arg(long, default_value_t = 3)]
    pub(crate) volunteers: usize,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Run a single tick, print the report, and exit
    #[arg(long)]
    pub(crate) once: bool,
    /// Override the configured sweep interval (seconds)
    #[arg(long)]
    pub(crate) interval_secs: Option<u64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let hub = memory_hub();
    let now = SystemClock.now();
    let catalog = seed_demo_catalog(&hub, now, args.volunteers, args.capacity)?;
    let activity = hub.activities.get(catalog.upcoming)?;

    println!("Volunteer Hub Demo");
    println!("==================");
    println!(
        "Activity #{} '{}' at {} ({} seats)",
        activity.activity_id.0, activity.title, activity.activity_time, activity.max_people
    );

    for step in capacity_walkthrough(&hub, &catalog)? {
        println!("  - {step}");
    }

    let roster = hub.applications.applications_for_activity(catalog.upcoming)?;
    println!();
    println!("Roster:");
    for view in roster {
        println!(
            "  #{:<4} {:<14} {}",
            view.application_id.0,
            view.username,
            view.current_status.label()
        );
    }
    Ok(())
}

/// Everyone applies, then the coordinator approves in order until the activity is full.
fn capacity_walkthrough(
    hub: &MemoryHub,
    catalog: &DemoCatalog,
) -> Result<Vec<String>, LifecycleError> {
    let mut steps = Vec::new();
    let mut applications = Vec::new();
    for volunteer in &catalog.volunteers {
        let application = hub.applications.apply(*volunteer, catalog.upcoming)?;
        steps.push(format!(
            "user #{} applied (application #{}, pending)",
            volunteer.0, application.application_id.0
        ));
        applications.push(application.application_id);
    }

    for application_id in applications {
        match hub.applications.set_status(
            application_id,
            ApplicationStatus::Approved,
            catalog.coordinator,
        ) {
            Ok(_) => steps.push(format!("application #{} approved", application_id.0)),
            Err(err @ LifecycleError::ActivityFull(_)) => {
                steps.push(format!("application #{} refused: {err}", application_id.0))
            }
            Err(err) => return Err(err),
        }
    }
    Ok(steps)
}

pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let interval = args
        .interval_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(config.sweeper.interval);

    let hub = memory_hub();
    let catalog = seed_demo_catalog(&hub, SystemClock.now(), 0, 5)?;
    let sweeper = hub.sweeper(interval);

    if args.once {
        let report = sweeper.sweep_once().map_err(LifecycleError::from)?;
        print_report(&report);
        let past = hub.activities.get(catalog.past_due)?;
        println!("'{}' is now {}", past.title, past.status.label());
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let handle = sweeper.spawn(shutdown.clone());
    shutdown_signal(shutdown).await;
    if handle.await.is_err() {
        eprintln!("expiration sweeper ended abnormally");
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!("Sweep report");
    println!("  examined: {}", report.examined);
    println!("  expired:  {:?}", ids(&report.expired));
    println!("  failed:   {:?}", ids(&report.failed));
}

fn ids(activities: &[ActivityId]) -> Vec<i64> {
    activities.iter().map(|id| id.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walkthrough_stops_approving_at_capacity() {
        let hub = memory_hub();
        let catalog = seed_demo_catalog(&hub, SystemClock.now(), 3, 2).expect("seeded");

        let steps = capacity_walkthrough(&hub, &catalog).expect("walkthrough runs");

        assert_eq!(steps.len(), 6);
        assert!(steps[3].ends_with("approved"));
        assert!(steps[4].ends_with("approved"));
        assert!(steps[5].ends_with("refused: activity full"));
    }
}
