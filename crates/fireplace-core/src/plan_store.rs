use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ChecklistFilter, ChecklistItem, PlanFocus};
use crate::traits::PlanStore;

/// A plan as loaded from a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub focus: String,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

impl PlanRecord {
    pub fn new(focus: impl Into<String>, checklist: Vec<ChecklistItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            focus: focus.into(),
            checklist,
        }
    }

    /// Read a plan from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::InvalidInput(format!("Failed to read plan file {}: {e}", path.display()))
        })?;
        let plan: PlanRecord = serde_json::from_str(&raw)?;
        if plan.focus.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Plan file {} has an empty focus",
                path.display()
            )));
        }
        Ok(plan)
    }
}

/// A [`PlanStore`] kept in memory, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanStore {
    plans: Arc<RwLock<HashMap<Uuid, PlanRecord>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plan. Returns its id.
    pub fn insert(&self, plan: PlanRecord) -> Uuid {
        let id = plan.id;
        self.plans
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, plan);
        id
    }

    fn get(&self, plan_id: Uuid) -> Result<PlanRecord, AppError> {
        self.plans
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("plan {plan_id}")))
    }
}

impl PlanStore for InMemoryPlanStore {
    async fn plan_focus(&self, plan_id: Uuid) -> Result<PlanFocus, AppError> {
        let plan = self.get(plan_id)?;
        Ok(PlanFocus { focus: plan.focus })
    }

    async fn checklist_items(
        &self,
        plan_id: Uuid,
        filter: ChecklistFilter,
    ) -> Result<Vec<ChecklistItem>, AppError> {
        let plan = self.get(plan_id)?;
        let now = Utc::now();
        Ok(plan
            .checklist
            .into_iter()
            .filter(|item| filter.matches(item, now))
            .collect())
    }
}
