use std::sync::Arc;

use chrono::{DateTime, Utc};
use claim_core::model::{Stage, TaskId};
use serde::Serialize;
use storage::repository::ClaimRepository;

use crate::error::DashboardError;
use crate::progress::{ProgressService, SyncStatus};
use crate::session::SessionState;

/// Everything the claimant's home screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub user_name: String,
    pub stage: Stage,
    pub stage_label: &'static str,
    pub completed_tasks: Vec<&'static str>,
    pub sync: SyncStatus,
    pub has_claim: bool,
    pub case_number: Option<String>,
    pub accident_date: Option<DateTime<Utc>>,
    /// Where to send a claimant who has not filed yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<TaskId>,
}

#[derive(Clone)]
pub struct DashboardService {
    progress: Arc<ProgressService>,
    claims: Arc<dyn ClaimRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(progress: Arc<ProgressService>, claims: Arc<dyn ClaimRepository>) -> Self {
        Self { progress, claims }
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Unauthenticated` for anonymous sessions.
    /// Returns `DashboardError::Progress` or `Storage` if a read fails.
    pub async fn view(&self, session: &SessionState) -> Result<DashboardView, DashboardError> {
        let identity = session.identity().ok_or(DashboardError::Unauthenticated)?;
        let snapshot = self.progress.snapshot(session).await?;
        let latest = self.claims.latest_claim(identity.id).await?;
        let has_claim = latest.is_some();
        Ok(DashboardView {
            user_name: identity.name.clone(),
            stage: snapshot.progress.stage(),
            stage_label: snapshot.stage_label,
            completed_tasks: snapshot.progress.completed_tasks().to_strings(),
            sync: snapshot.sync,
            has_claim,
            case_number: latest.as_ref().and_then(|c| c.case_number.clone()),
            accident_date: latest.as_ref().map(|c| c.accident_date),
            next_step: (!has_claim).then_some(TaskId::ClaimWrite),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_core::model::{ClaimDraft, UserId, UserIdentity};
    use claim_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    use crate::claim_service::ClaimService;
    use crate::progress::RetryPolicy;

    fn session() -> SessionState {
        SessionState::LoggedIn(UserIdentity {
            id: UserId::new(11),
            name: "Choi".into(),
            phone: "01033334444".into(),
        })
    }

    fn wiring() -> (DashboardService, ClaimService) {
        let repo = InMemoryRepository::new();
        let progress = Arc::new(ProgressService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            RetryPolicy::no_retry(),
            false,
        ));
        let claims: Arc<dyn ClaimRepository> = Arc::new(repo);
        (
            DashboardService::new(Arc::clone(&progress), Arc::clone(&claims)),
            ClaimService::new(fixed_clock(), claims, progress),
        )
    }

    #[tokio::test]
    async fn new_user_is_pointed_at_claim_form() {
        let (dashboard, _) = wiring();
        let view = dashboard.view(&session()).await.unwrap();
        assert!(!view.has_claim);
        assert_eq!(view.next_step, Some(TaskId::ClaimWrite));
        assert_eq!(view.stage, Stage::IntakeReceived);
        assert_eq!(view.user_name, "Choi");
    }

    #[tokio::test]
    async fn filed_claim_shows_case_details() {
        let (dashboard, claims) = wiring();
        let draft = ClaimDraft {
            name: "Choi".into(),
            rrn_front: "880202".into(),
            rrn_back: "2".into(),
            address: "Incheon".into(),
            job: "nurse".into(),
            accident_date: "2025-12-01T08:30".into(),
            accident_location: "Songdo".into(),
            accident_type: "pedestrian".into(),
            accident_desc: "struck at crosswalk".into(),
            injury_part: "knee".into(),
            hospital_name: "Incheon Central".into(),
            hospital_location: "Incheon".into(),
            treatment_type: "inpatient".into(),
            first_visit_date: "2025-12-01".into(),
            case_number: Some("2512010830-01".into()),
        };
        claims.submit(&session(), draft).await.unwrap();

        let view = dashboard.view(&session()).await.unwrap();
        assert!(view.has_claim);
        assert_eq!(view.next_step, None);
        assert_eq!(view.case_number.as_deref(), Some("2512010830-01"));
        assert_eq!(view.stage, Stage::DamageInfo);
        assert_eq!(view.completed_tasks, vec!["claim-write"]);
    }

    #[tokio::test]
    async fn anonymous_has_no_dashboard() {
        let (dashboard, _) = wiring();
        assert!(matches!(
            dashboard.view(&SessionState::Anonymous).await,
            Err(DashboardError::Unauthenticated)
        ));
    }
}
