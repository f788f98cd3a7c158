//! Contract record status lifecycle.
//!
//! ```text
//!   create ──> draft ──deploy──> deployed (terminal)
//!                │  ^
//!           fail │  │ retry
//!                v  │
//!               failed
//! ```
//!
//! `transaction_hash` and `contract_address` are set exactly when a record is
//! deployed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractRecord, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Deployed,
    Failed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 3] = [
        ContractStatus::Draft,
        ContractStatus::Deployed,
        ContractStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Deployed => "deployed",
            ContractStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ContractStatus::Draft),
            "deployed" => Ok(ContractStatus::Deployed),
            "failed" => Ok(ContractStatus::Failed),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// A requested mutation of a record's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Wallet reported a successful deployment.
    Deploy {
        transaction_hash: String,
        contract_address: String,
        gas_used: Option<u64>,
    },
    /// Generation or deployment reported an error.
    Fail { reason: Option<String> },
    /// Return a failed record to draft.
    Retry,
}

impl StatusChange {
    pub fn target(&self) -> ContractStatus {
        match self {
            StatusChange::Deploy { .. } => ContractStatus::Deployed,
            StatusChange::Fail { .. } => ContractStatus::Failed,
            StatusChange::Retry => ContractStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("contract is already deployed; deployed is terminal")]
    Terminal,
    #[error("cannot move contract from {from} to {to}")]
    Illegal {
        from: ContractStatus,
        to: ContractStatus,
    },
    #[error("deployment requires a non-empty {0}")]
    MissingDeploymentField(&'static str),
}

/// Check whether `change` may be applied to a record in `from`.
pub fn check(from: ContractStatus, change: &StatusChange) -> Result<(), StateTransitionError> {
    if from == ContractStatus::Deployed {
        return Err(StateTransitionError::Terminal);
    }
    let to = change.target();
    let allowed = matches!(
        (from, to),
        (ContractStatus::Draft, ContractStatus::Deployed)
            | (ContractStatus::Draft, ContractStatus::Failed)
            | (ContractStatus::Failed, ContractStatus::Draft)
    );
    if !allowed {
        return Err(StateTransitionError::Illegal { from, to });
    }
    if let StatusChange::Deploy {
        transaction_hash,
        contract_address,
        ..
    } = change
    {
        if transaction_hash.trim().is_empty() {
            return Err(StateTransitionError::MissingDeploymentField("transaction_hash"));
        }
        if contract_address.trim().is_empty() {
            return Err(StateTransitionError::MissingDeploymentField("contract_address"));
        }
    }
    Ok(())
}

/// Apply `change` to `record`, leaving it untouched on error.
pub fn apply(
    record: &mut ContractRecord,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<(), StateTransitionError> {
    check(record.status, &change)?;
    match change {
        StatusChange::Deploy {
            transaction_hash,
            contract_address,
            gas_used,
        } => {
            record.status = ContractStatus::Deployed;
            record.transaction_hash = Some(transaction_hash.trim().to_string());
            record.contract_address = Some(contract_address.trim().to_string());
            if let Some(gas) = gas_used {
                record.metadata.insert("gas_used".into(), gas.into());
            }
        }
        StatusChange::Fail { reason } => {
            record.status = ContractStatus::Failed;
            if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
                record.metadata.insert("failure_reason".into(), reason.into());
            }
        }
        StatusChange::Retry => {
            record.status = ContractStatus::Draft;
            record.metadata.remove("failure_reason");
        }
    }
    touch(record, now);
    Ok(())
}

/// Advance `updated_at`, strictly, even when the clock has not moved.
pub fn touch(record: &mut ContractRecord, now: DateTime<Utc>) {
    record.updated_at = if now > record.updated_at {
        now
    } else {
        record.updated_at + Duration::microseconds(1)
    };
}

/// Wire form of a status update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusUpdateError {
    #[error("Status is required")]
    MissingStatus,
    #[error("Invalid status '{0}'. Valid options: draft, deployed, failed")]
    InvalidStatus(String),
}

impl StatusUpdate {
    pub fn into_change(self) -> Result<StatusChange, StatusUpdateError> {
        let raw = self
            .status
            .filter(|s| !s.trim().is_empty())
            .ok_or(StatusUpdateError::MissingStatus)?;
        let status: ContractStatus = raw
            .parse()
            .map_err(|_| StatusUpdateError::InvalidStatus(raw.clone()))?;
        Ok(match status {
            ContractStatus::Deployed => StatusChange::Deploy {
                transaction_hash: self.transaction_hash.unwrap_or_default(),
                contract_address: self.contract_address.unwrap_or_default(),
                gas_used: None,
            },
            ContractStatus::Failed => StatusChange::Fail {
                reason: self.reason,
            },
            ContractStatus::Draft => StatusChange::Retry,
        })
    }
}
