use crate::engine::WorkflowEngine;
use crate::error::WorkflowResult;
use govern_ledger::TaskStatistics;
use govern_storage::{AccountFilter, LookupFilter};
use govern_types::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dashboard figures across both entity kinds and the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Overview {
    pub accounts_total: usize,
    pub accounts_by_role: BTreeMap<Role, usize>,
    pub lookups_total: usize,
    pub lookups_by_type: BTreeMap<String, usize>,
    pub tasks: TaskStatistics,
}

impl WorkflowEngine {
    pub async fn overview(&self) -> WorkflowResult<Overview> {
        let accounts = self.list_accounts(AccountFilter::default()).await?;
        let mut accounts_by_role: BTreeMap<Role, usize> =
            Role::ALL.into_iter().map(|role| (role, 0)).collect();
        for account in &accounts {
            *accounts_by_role.entry(account.role).or_insert(0) += 1;
        }

        let lookups = self.list_lookup_entries(LookupFilter::default()).await?;
        let mut lookups_by_type = BTreeMap::new();
        for entry in &lookups {
            *lookups_by_type.entry(entry.data_type.clone()).or_insert(0) += 1;
        }

        Ok(Overview {
            accounts_total: accounts.len(),
            accounts_by_role,
            lookups_total: lookups.len(),
            lookups_by_type,
            tasks: self.ledger().statistics().await?,
        })
    }
}
