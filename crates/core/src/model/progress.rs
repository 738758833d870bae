use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

/// A one-way claimant action that feeds the pipeline stage.
///
/// The kebab-case literals are the storage and wire representation; existing
/// records depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskId {
    ClaimWrite,
    PhotoUpload,
    DocsGuide,
    MedGuarantee,
}

impl TaskId {
    pub const ALL: [TaskId; 4] = [
        TaskId::ClaimWrite,
        TaskId::PhotoUpload,
        TaskId::DocsGuide,
        TaskId::MedGuarantee,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::ClaimWrite => "claim-write",
            TaskId::PhotoUpload => "photo-upload",
            TaskId::DocsGuide => "docs-guide",
            TaskId::MedGuarantee => "med-guarantee",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskId {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskId::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| ProgressError::UnknownTask(s.to_string()))
    }
}

//
// ─── STAGES ────────────────────────────────────────────────────────────────────
//

/// Coarse pipeline position shown to the claimant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    #[default]
    IntakeReceived,
    DamageInfo,
    Treatment,
    BenefitPayment,
    /// Not reachable from any task combination; set only by records written
    /// outside this workflow.
    TreatmentCostPayment,
}

impl Stage {
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            Stage::IntakeReceived => 0,
            Stage::DamageInfo => 1,
            Stage::Treatment => 2,
            Stage::BenefitPayment => 3,
            Stage::TreatmentCostPayment => 4,
        }
    }

    /// Parse a persisted stage index.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StageOutOfRange` for values above 4.
    pub fn from_index(index: u8) -> Result<Self, ProgressError> {
        match index {
            0 => Ok(Stage::IntakeReceived),
            1 => Ok(Stage::DamageInfo),
            2 => Ok(Stage::Treatment),
            3 => Ok(Stage::BenefitPayment),
            4 => Ok(Stage::TreatmentCostPayment),
            other => Err(ProgressError::StageOutOfRange(i64::from(other))),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Stage::IntakeReceived => "intake received",
            Stage::DamageInfo => "damage info",
            Stage::Treatment => "treatment",
            Stage::BenefitPayment => "benefit payment",
            Stage::TreatmentCostPayment => "treatment-cost payment",
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.index()
    }
}

impl TryFrom<u8> for Stage {
    type Error = ProgressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::from_index(value)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.label())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown task id: {0}")]
    UnknownTask(String),

    #[error("stage out of range: {0}")]
    StageOutOfRange(i64),
}

//
// ─── COMPLETED TASK SET ────────────────────────────────────────────────────────
//

/// Set of completed tasks. Iterates in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedTasks(BTreeSet<TaskId>);

impl CompletedTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, task: TaskId) -> bool {
        self.0.contains(&task)
    }

    /// Returns `true` if the task was not present before.
    pub fn insert(&mut self, task: TaskId) -> bool {
        self.0.insert(task)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.0.iter().copied()
    }

    /// Literal task ids in canonical order.
    #[must_use]
    pub fn to_strings(&self) -> Vec<&'static str> {
        self.iter().map(TaskId::as_str).collect()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<TaskId> for CompletedTasks {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

//
// ─── DERIVATION ────────────────────────────────────────────────────────────────
//

/// Stage implied by a task set: the highest rule whose condition holds.
///
/// Every rule above stage 0 requires `claim-write`; a set without it stays at
/// `IntakeReceived` whatever else it contains.
#[must_use]
pub fn derive_stage(tasks: &CompletedTasks) -> Stage {
    if !tasks.contains(TaskId::ClaimWrite) {
        return Stage::IntakeReceived;
    }
    let mut stage = Stage::DamageInfo;
    if tasks.contains(TaskId::PhotoUpload) && tasks.contains(TaskId::DocsGuide) {
        stage = stage.max(Stage::Treatment);
    }
    if tasks.contains(TaskId::MedGuarantee) {
        stage = stage.max(Stage::BenefitPayment);
    }
    stage
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Result of `Progress::complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The task was already in the set; nothing changed.
    AlreadyCompleted,
    /// The task was added. `stage` may equal `previous`.
    Recorded { previous: Stage, stage: Stage },
}

impl Completion {
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Completion::Recorded { .. })
    }
}

/// One claimant's pipeline stage and completed tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(rename = "currentStep")]
    stage: Stage,
    completed_tasks: CompletedTasks,
}

impl Progress {
    /// Zero state: stage 0, no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a stored record as-is. The stage is not recomputed.
    #[must_use]
    pub fn from_persisted(stage: Stage, completed_tasks: CompletedTasks) -> Self {
        Self {
            stage,
            completed_tasks,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn completed_tasks(&self) -> &CompletedTasks {
        &self.completed_tasks
    }

    #[must_use]
    pub fn is_completed(&self, task: TaskId) -> bool {
        self.completed_tasks.contains(task)
    }

    /// Mark a task complete and advance the stage. Never lowers the stage.
    pub fn complete(&mut self, task: TaskId) -> Completion {
        if !self.completed_tasks.insert(task) {
            return Completion::AlreadyCompleted;
        }
        let previous = self.stage;
        self.stage = previous.max(derive_stage(&self.completed_tasks));
        Completion::Recorded {
            previous,
            stage: self.stage,
        }
    }

    pub fn reset(&mut self) {
        self.stage = Stage::IntakeReceived;
        self.completed_tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(ids: &[TaskId]) -> CompletedTasks {
        ids.iter().copied().collect()
    }

    fn all_subsets() -> Vec<CompletedTasks> {
        (0_u8..16)
            .map(|mask| {
                TaskId::ALL
                    .into_iter()
                    .enumerate()
                    .filter(|(bit, _)| mask & (1 << bit) != 0)
                    .map(|(_, task)| task)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn task_literals_round_trip() {
        for task in TaskId::ALL {
            assert_eq!(task.as_str().parse::<TaskId>().unwrap(), task);
        }
        assert_eq!(
            "claim_write".parse::<TaskId>(),
            Err(ProgressError::UnknownTask("claim_write".into()))
        );
    }

    #[test]
    fn derive_stage_matches_rule_table() {
        use TaskId::*;

        assert_eq!(derive_stage(&tasks(&[])), Stage::IntakeReceived);
        assert_eq!(derive_stage(&tasks(&[ClaimWrite])), Stage::DamageInfo);
        assert_eq!(
            derive_stage(&tasks(&[ClaimWrite, PhotoUpload])),
            Stage::DamageInfo
        );
        assert_eq!(
            derive_stage(&tasks(&[ClaimWrite, PhotoUpload, DocsGuide])),
            Stage::Treatment
        );
        assert_eq!(
            derive_stage(&tasks(&[ClaimWrite, MedGuarantee])),
            Stage::BenefitPayment
        );
        assert_eq!(
            derive_stage(&tasks(&[ClaimWrite, PhotoUpload, DocsGuide, MedGuarantee])),
            Stage::BenefitPayment
        );
    }

    #[test]
    fn derive_stage_without_claim_write_stays_at_intake() {
        use TaskId::*;

        for set in [
            tasks(&[PhotoUpload]),
            tasks(&[DocsGuide]),
            tasks(&[MedGuarantee]),
            tasks(&[PhotoUpload, DocsGuide]),
            tasks(&[PhotoUpload, DocsGuide, MedGuarantee]),
        ] {
            assert_eq!(derive_stage(&set), Stage::IntakeReceived, "set {set:?}");
        }
    }

    #[test]
    fn derive_stage_is_exhaustively_consistent() {
        for set in all_subsets() {
            let expected = if !set.contains(TaskId::ClaimWrite) {
                0
            } else if set.contains(TaskId::MedGuarantee) {
                3
            } else if set.contains(TaskId::PhotoUpload) && set.contains(TaskId::DocsGuide) {
                2
            } else {
                1
            };
            assert_eq!(derive_stage(&set).index(), expected, "set {set:?}");
            assert_ne!(derive_stage(&set), Stage::TreatmentCostPayment);
        }
    }

    #[test]
    fn completing_twice_is_idempotent() {
        for task in TaskId::ALL {
            let mut once = Progress::new();
            once.complete(task);

            let mut twice = Progress::new();
            twice.complete(task);
            let second = twice.complete(task);

            assert_eq!(second, Completion::AlreadyCompleted);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn stage_never_decreases_across_any_order() {
        let orders = [
            [0, 1, 2, 3],
            [3, 2, 1, 0],
            [1, 3, 0, 2],
            [2, 0, 3, 1],
        ];
        for order in orders {
            let mut progress = Progress::new();
            let mut last = progress.stage();
            for idx in order {
                progress.complete(TaskId::ALL[idx]);
                assert!(progress.stage() >= last);
                last = progress.stage();
            }
        }
    }

    #[test]
    fn completion_keeps_higher_hydrated_stage() {
        let mut progress =
            Progress::from_persisted(Stage::TreatmentCostPayment, tasks(&[TaskId::ClaimWrite]));
        let outcome = progress.complete(TaskId::DocsGuide);
        assert_eq!(
            outcome,
            Completion::Recorded {
                previous: Stage::TreatmentCostPayment,
                stage: Stage::TreatmentCostPayment,
            }
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut progress = Progress::new();
        for task in TaskId::ALL {
            progress.complete(task);
        }
        progress.reset();
        assert_eq!(progress, Progress::new());
        assert!(progress.completed_tasks().is_empty());
    }

    #[test]
    fn hydration_does_not_recompute() {
        use TaskId::*;
        let stored = tasks(&[ClaimWrite, PhotoUpload, DocsGuide]);
        let progress = Progress::from_persisted(Stage::Treatment, stored.clone());
        assert_eq!(progress.stage(), Stage::Treatment);
        assert_eq!(progress.completed_tasks(), &stored);
    }

    #[test]
    fn claimant_walkthrough() {
        use TaskId::*;
        let mut progress = Progress::new();

        progress.complete(ClaimWrite);
        assert_eq!(progress.stage(), Stage::DamageInfo);
        assert_eq!(progress.completed_tasks(), &tasks(&[ClaimWrite]));

        progress.complete(PhotoUpload);
        assert_eq!(progress.stage(), Stage::DamageInfo);
        assert_eq!(progress.completed_tasks(), &tasks(&[ClaimWrite, PhotoUpload]));

        progress.complete(DocsGuide);
        assert_eq!(progress.stage(), Stage::Treatment);
        assert_eq!(
            progress.completed_tasks(),
            &tasks(&[ClaimWrite, PhotoUpload, DocsGuide])
        );
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut progress = Progress::new();
        progress.complete(TaskId::ClaimWrite);
        progress.complete(TaskId::PhotoUpload);

        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "currentStep": 1,
                "completedTasks": ["claim-write", "photo-upload"],
            })
        );
    }

    #[test]
    fn stage_rejects_out_of_range_index() {
        assert_eq!(
            Stage::from_index(5),
            Err(ProgressError::StageOutOfRange(5))
        );
        assert!(serde_json::from_str::<Stage>("7").is_err());
    }
}
