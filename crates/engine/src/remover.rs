use crate::binding::{BindingIdentity, BindingKind};
use crate::error::{EngineError, Result};
use crate::index::{DuplicateGroups, DuplicateSet};
use crate::key::CanonicalKey;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::watch;

/// Deletes one binding through whatever API owns it.
#[async_trait]
pub trait BindingDeleter: Send + Sync {
    async fn delete(&self, kind: BindingKind, identity: &BindingIdentity) -> Result<()>;
}

/// What happens to the rest of the run after a failed delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop at the first failure
    #[default]
    FailFast,
    /// Abandon the failing group, keep going with the others
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete,
    /// Survivor of another group; never deleted
    Protected,
    /// Already scheduled by an earlier group
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub kind: BindingKind,
    pub key: CanonicalKey,
    pub identity: BindingIdentity,
    pub disposition: Disposition,
    group: usize,
}

/// Every redundant identity of every group, decided before any delete runs.
#[derive(Debug, Clone, Default)]
pub struct RemovalPlan {
    steps: Vec<PlannedStep>,
    groups: usize,
}

impl RemovalPlan {
    #[must_use]
    pub fn new(groups: &DuplicateGroups) -> Self {
        let mut plan = Self::default();
        plan.push_groups(groups);
        plan
    }

    /// RoleBindings first, then ClusterRoleBindings.
    #[must_use]
    pub fn for_set(duplicates: &DuplicateSet) -> Self {
        let mut plan = Self::default();
        for kind in BindingKind::ALL {
            plan.push_groups(duplicates.groups(kind));
        }
        plan
    }

    fn push_groups(&mut self, groups: &DuplicateGroups) {
        let kind = groups.kind();
        let survivors: HashSet<&BindingIdentity> =
            groups.iter().map(|group| group.survivor()).collect();
        let mut scheduled: HashSet<&BindingIdentity> = HashSet::new();

        for group in groups.iter() {
            let group_id = self.groups;
            self.groups += 1;
            for identity in group.redundant() {
                let disposition = if survivors.contains(identity) {
                    log::warn!(
                        "keeping {kind} {identity}: it is the survivor of another duplicate group"
                    );
                    Disposition::Protected
                } else if !scheduled.insert(identity) {
                    Disposition::Duplicate
                } else {
                    Disposition::Delete
                };
                self.steps.push(PlannedStep {
                    kind,
                    key: group.key().clone(),
                    identity: identity.clone(),
                    disposition,
                    group: group_id,
                });
            }
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Number of deletes the plan would issue
    #[must_use]
    pub fn deletions(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.disposition == Disposition::Delete)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalStatus {
    Deleted,
    Failed(String),
    Protected,
    Duplicate,
    /// Not attempted because an earlier delete failed
    Skipped,
    /// Not attempted because the run was cancelled
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub kind: BindingKind,
    pub key: CanonicalKey,
    pub identity: BindingIdentity,
    pub status: RemovalStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    outcomes: Vec<RemovalOutcome>,
}

impl RemovalReport {
    #[must_use]
    pub fn outcomes(&self) -> &[RemovalOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn deleted(&self) -> usize {
        self.count(|status| *status == RemovalStatus::Deleted)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, RemovalStatus::Failed(_)))
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|status| *status == RemovalStatus::Cancelled)
    }

    fn count(&self, pred: impl Fn(&RemovalStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    #[must_use]
    pub fn first_failure(&self) -> Option<&RemovalOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.status, RemovalStatus::Failed(_)))
    }

    /// Number of deleted bindings, or the first failure.
    pub fn into_result(self) -> Result<usize> {
        if let Some(outcome) = self.first_failure() {
            let message = match &outcome.status {
                RemovalStatus::Failed(message) => message.clone(),
                _ => String::new(),
            };
            return Err(EngineError::DeleteFailed {
                kind: outcome.kind,
                identity: outcome.identity.clone(),
                message,
            });
        }
        Ok(self.deleted())
    }
}

/// Deletes all but the survivor of each duplicate group.
pub struct Remover<D> {
    deleter: D,
    mode: FailureMode,
    cancel: Option<watch::Receiver<bool>>,
}

impl<D: BindingDeleter> Remover<D> {
    pub fn new(deleter: D, mode: FailureMode) -> Self {
        Self {
            deleter,
            mode,
            cancel: None,
        }
    }

    #[must_use]
    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    /// Stop issuing deletes once `cancel` reads true. Issued deletes stay committed.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn remove(&self, groups: &DuplicateGroups) -> RemovalReport {
        self.execute(&RemovalPlan::new(groups)).await
    }

    pub async fn remove_all(&self, duplicates: &DuplicateSet) -> RemovalReport {
        self.execute(&RemovalPlan::for_set(duplicates)).await
    }

    pub async fn execute(&self, plan: &RemovalPlan) -> RemovalReport {
        let mut report = RemovalReport::default();
        let mut halted = false;
        let mut cancelled = false;
        let mut failed_groups: HashSet<usize> = HashSet::new();
        let mut current_key: Option<&CanonicalKey> = None;

        for step in plan.steps() {
            if current_key != Some(&step.key) {
                log::debug!("processing dupes for {}", step.key);
                current_key = Some(&step.key);
            }

            let status = match step.disposition {
                Disposition::Protected => RemovalStatus::Protected,
                Disposition::Duplicate => RemovalStatus::Duplicate,
                Disposition::Delete => {
                    cancelled = cancelled || self.is_cancelled();
                    if cancelled {
                        RemovalStatus::Cancelled
                    } else if halted || failed_groups.contains(&step.group) {
                        RemovalStatus::Skipped
                    } else {
                        self.delete_one(step, &mut halted, &mut failed_groups)
                            .await
                    }
                }
            };

            report.outcomes.push(RemovalOutcome {
                kind: step.kind,
                key: step.key.clone(),
                identity: step.identity.clone(),
                status,
            });
        }

        if cancelled {
            log::warn!(
                "removal cancelled: {} deleted, {} not attempted",
                report.deleted(),
                report.cancelled()
            );
        }
        report
    }

    async fn delete_one(
        &self,
        step: &PlannedStep,
        halted: &mut bool,
        failed_groups: &mut HashSet<usize>,
    ) -> RemovalStatus {
        log::info!("removing {} {}", step.kind, step.identity);
        match self.deleter.delete(step.kind, &step.identity).await {
            Ok(()) => RemovalStatus::Deleted,
            Err(err) => {
                log::error!("could not remove {} {}: {err}", step.kind, step.identity);
                match self.mode {
                    FailureMode::FailFast => *halted = true,
                    FailureMode::BestEffort => {
                        failed_groups.insert(step.group);
                    }
                }
                RemovalStatus::Failed(err.to_string())
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
