use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for volunteer activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityId(pub i64);

/// Identifier wrapper for attendance applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

/// Identifier wrapper for audit log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusLogId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeptId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

/// Lifecycle of an activity. Only the sweeper moves `Active` to `Expired`, and nothing moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Expired,
}

impl ActivityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Expired => "expired",
        }
    }
}

/// Review state of a single application. Any state can be set from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Withdrawal is only offered while the request is still open or granted.
    pub const fn is_cancellable(self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Approved)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when a status string is not one of `pending`, `approved` or `rejected`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status must be one of approved / rejected / pending, got '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: RoleId,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub username: String,
}

/// A scheduled volunteer event with a capacity ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: ActivityId,
    pub dept_id: DeptId,
    pub category_id: CategoryId,
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub activity_time: NaiveDateTime,
    pub location: String,
    pub max_people: u32,
    pub status: ActivityStatus,
}

impl Activity {
    /// Past-due activities count as expired even before the sweeper catches up.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.activity_time < now || self.status == ActivityStatus::Expired
    }

    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        self.activity_time <= now
    }
}

/// Validated activity fields ready to be written by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityFields {
    pub dept_id: DeptId,
    pub category_id: CategoryId,
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub activity_time: NaiveDateTime,
    pub location: String,
    pub max_people: u32,
}

/// Raw administrator input for creating or replacing an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub dept_id: DeptId,
    pub category_id: CategoryId,
    pub creator_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub activity_time: String,
    pub location: String,
    pub max_people: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub activity_id: ActivityId,
    pub apply_time: NaiveDateTime,
    pub current_status: ApplicationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub user_id: UserId,
    pub activity_id: ActivityId,
    pub apply_time: NaiveDateTime,
}

/// Append-only audit row written whenever an application's status is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatusLog {
    pub log_id: StatusLogId,
    pub application_id: ApplicationId,
    pub handler_id: Option<UserId>,
    pub log_status: ApplicationStatus,
    pub handle_time: NaiveDateTime,
}

/// Audit details for a status write; the store assigns the row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub handler_id: Option<UserId>,
    pub status: ApplicationStatus,
    pub handle_time: NaiveDateTime,
}

/// Query used by listings and the sweeper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub status: Option<ActivityStatus>,
    #[serde(default)]
    pub dept_id: Option<DeptId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub title_contains: Option<String>,
}

impl ActivityQuery {
    pub fn active() -> Self {
        Self {
            status: Some(ActivityStatus::Active),
            ..Self::default()
        }
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if self.status.is_some_and(|status| status != activity.status) {
            return false;
        }
        if self.dept_id.is_some_and(|dept| dept != activity.dept_id) {
            return false;
        }
        if self
            .category_id
            .is_some_and(|category| category != activity.category_id)
        {
            return false;
        }
        match &self.title_contains {
            Some(keyword) => activity
                .title
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            None => true,
        }
    }
}

/// Rows removed by a cascading activity delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub status_logs: usize,
    pub applications: usize,
}

/// Application row joined with the applicant's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityApplicationView {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub username: String,
    pub apply_time: NaiveDateTime,
    pub current_status: ApplicationStatus,
}

/// Application row joined with the activity it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserApplicationView {
    pub application_id: ApplicationId,
    pub activity_id: ActivityId,
    pub title: String,
    pub activity_time: NaiveDateTime,
    pub location: String,
    pub current_status: ApplicationStatus,
    pub apply_time: NaiveDateTime,
}

/// Open activity a user could still apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableActivity {
    pub activity_id: ActivityId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub activity_time: NaiveDateTime,
    pub max_people: u32,
    /// Approved applications only. Pending and rejected ones hold no seat.
    pub approved_count: usize,
    /// `max_people - approved_count`, the same count the approval capacity check uses.
    pub remaining_slots: u32,
}
