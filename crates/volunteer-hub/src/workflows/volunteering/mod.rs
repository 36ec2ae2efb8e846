//! Volunteer activity catalog, application lifecycle, and the background expiration sweep.
//!
//! Every service is generic over a [`VolunteerStore`] injected at construction; nothing here
//! reaches for a global connection.

pub mod activities;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod sweeper;
pub mod users;

#[cfg(test)]
mod tests;

pub use activities::{validate_draft, ActivityCatalog};
pub use domain::{
    Activity, ActivityApplicationView, ActivityDraft, ActivityFields, ActivityId, ActivityQuery,
    ActivityStatus, Application, ApplicationId, ApplicationStatus, ApplicationStatusLog,
    AvailableActivity, CascadeSummary, CategoryId, DeptId, NewApplication, Role, RoleId,
    StatusEntry, StatusLogId, UnknownStatus, User, UserApplicationView, UserId,
};
pub use lifecycle::{ApplicationLifecycle, ErrorKind, LifecycleError};
pub use memory::{InMemoryVolunteerStore, DEFAULT_ROLES};
pub use repository::{RepositoryError, VolunteerStore};
pub use router::volunteer_router;
pub use schedule::{parse_activity_time, Clock, SystemClock};
pub use service::VolunteerHub;
pub use sweeper::{ExpirationSweeper, SweepReport, DEFAULT_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL};
pub use users::UserRegistry;
