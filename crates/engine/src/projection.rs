//! Read-side aggregation: per-organization dashboards.
//!
//! Pure reads with no side effects. Zero rows produce zero counts and an
//! absent average, never an error.

use std::sync::Arc;

use cadre_core::InstanceStatus;
use cadre_storage::{CadreStorage, InstanceListing};
use serde::Serialize;
use time::{Date, OffsetDateTime, Time};

use crate::clock::parse_timestamp;
use crate::error::EngineError;
use crate::principal::Principal;

/// Organization-wide summary counts.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationStats {
    pub total_members: usize,
    pub total_processes: usize,
    /// Instances currently pending.
    pub active_instances: usize,
    /// Instances that reached a terminal status since the start of the
    /// current calendar month (UTC).
    pub completed_this_month: usize,
    /// Mean completion time in days over completed instances, rendered to
    /// one decimal place. `None` when nothing has completed yet.
    pub avg_completion_time: Option<String>,
}

pub struct ProjectionService<S: CadreStorage> {
    storage: Arc<S>,
}

impl<S: CadreStorage> ProjectionService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        ProjectionService { storage }
    }

    /// The organization's instances joined with definition name, current
    /// step name, and starter identity.
    pub async fn instances(
        &self,
        principal: &Principal,
    ) -> Result<Vec<InstanceListing>, EngineError> {
        Ok(self
            .storage
            .list_instances(&principal.organization_id)
            .await?)
    }

    /// The organization's member directory.
    pub async fn members(
        &self,
        principal: &Principal,
    ) -> Result<Vec<cadre_storage::MemberRecord>, EngineError> {
        Ok(self
            .storage
            .list_members(&principal.organization_id)
            .await?)
    }

    pub async fn organization_stats(
        &self,
        principal: &Principal,
    ) -> Result<OrganizationStats, EngineError> {
        let org = &principal.organization_id;
        let total_members = self.storage.count_members(org).await?;
        let total_processes = self.storage.list_definitions(org).await?.len();
        let instances = self.storage.list_instances(org).await?;

        let active_instances = instances
            .iter()
            .filter(|i| i.instance.status == InstanceStatus::Pending)
            .count();

        let month_start = start_of_current_month();
        let completed_this_month = instances
            .iter()
            .filter(|i| i.instance.status.is_terminal())
            .filter_map(|i| i.instance.completed_at.as_deref().and_then(parse_timestamp))
            .filter(|completed| *completed >= month_start)
            .count();

        Ok(OrganizationStats {
            total_members,
            total_processes,
            active_instances,
            completed_this_month,
            avg_completion_time: average_completion_days(&instances),
        })
    }
}

/// Mean of `(completed_at - started_at)` in days, to one decimal place.
/// Only instances with a parseable completion time participate.
fn average_completion_days(instances: &[InstanceListing]) -> Option<String> {
    let durations: Vec<f64> = instances
        .iter()
        .filter_map(|i| {
            let started = parse_timestamp(&i.instance.started_at)?;
            let completed = i.instance.completed_at.as_deref().and_then(parse_timestamp)?;
            Some((completed - started).as_seconds_f64() / 86_400.0)
        })
        .collect();
    if durations.is_empty() {
        return None;
    }
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    Some(format!("{:.1}", mean))
}

fn start_of_current_month() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    // The 1st of the current month always exists.
    let first = Date::from_calendar_date(now.year(), now.month(), 1)
        .unwrap_or_else(|_| now.date());
    OffsetDateTime::new_utc(first, Time::MIDNIGHT)
}
