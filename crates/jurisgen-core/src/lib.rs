pub mod gas;
pub mod lifecycle;
pub mod rules;
pub mod store;
pub mod validate;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub use lifecycle::{ContractStatus, StateTransitionError, StatusChange, StatusUpdate};
pub use rules::{JurisdictionRule, RuleTable, RuleTableError};
pub use store::{ContractFilter, ContractStore, StatusCounts, StoreError};
pub use validate::{
    validate, validate_report, GenerationRequest, ValidatedRequest, ValidationFailure,
    ValidationIssue, ValidationReport,
};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    India,
    Eu,
    Us,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 3] = [Jurisdiction::India, Jurisdiction::Eu, Jurisdiction::Us];

    pub fn as_str(self) -> &'static str {
        match self {
            Jurisdiction::India => "india",
            Jurisdiction::Eu => "eu",
            Jurisdiction::Us => "us",
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Jurisdiction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "india" => Ok(Jurisdiction::India),
            "eu" => Ok(Jurisdiction::Eu),
            "us" => Ok(Jurisdiction::Us),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Escrow,
    Insurance,
    Settlement,
}

impl ContractType {
    pub const ALL: [ContractType; 3] = [
        ContractType::Escrow,
        ContractType::Insurance,
        ContractType::Settlement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContractType::Escrow => "escrow",
            ContractType::Insurance => "insurance",
            ContractType::Settlement => "settlement",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "escrow" => Ok(ContractType::Escrow),
            "insurance" => Ok(ContractType::Insurance),
            "settlement" => Ok(ContractType::Settlement),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// A string that does not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

// --- Records ---

/// Output of a successful generation call, ready to be stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContract {
    pub solidity_code: String,
    #[serde(default)]
    pub deploy_script: String,
    #[serde(default)]
    pub tests: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One row per generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: i64,
    pub jurisdiction: Jurisdiction,
    pub contract_type: ContractType,
    pub requirements: String,
    pub description: Option<String>,
    pub payee_address: Option<String>,
    pub payer_address: Option<String>,
    pub solidity_code: String,
    pub deploy_script: String,
    pub tests: String,
    pub metadata: Metadata,
    pub status: ContractStatus,
    pub transaction_hash: Option<String>,
    pub contract_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContractRecord {
    /// Rebuild the validated request this record was generated from.
    pub fn request(&self) -> ValidatedRequest {
        ValidatedRequest {
            jurisdiction: self.jurisdiction,
            contract_type: self.contract_type,
            requirements: self.requirements.clone(),
            description: self.description.clone(),
            payee_address: self.payee_address.clone(),
            payer_address: self.payer_address.clone(),
        }
    }

    pub fn contract_name(&self) -> &str {
        self.metadata
            .get("contract_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("GeneratedContract")
    }

    pub fn summary(&self) -> ContractSummary {
        ContractSummary {
            id: self.id,
            jurisdiction: self.jurisdiction,
            contract_type: self.contract_type,
            description: self.description.clone(),
            status: self.status,
            contract_address: self.contract_address.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing projection of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSummary {
    pub id: i64,
    pub jurisdiction: Jurisdiction,
    pub contract_type: ContractType,
    pub description: Option<String>,
    pub status: ContractStatus,
    pub contract_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Current time at the precision the store persists.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!(" India ".parse::<Jurisdiction>(), Ok(Jurisdiction::India));
        assert_eq!("EU".parse::<Jurisdiction>(), Ok(Jurisdiction::Eu));
        assert_eq!("Settlement".parse::<ContractType>(), Ok(ContractType::Settlement));
        assert!("mars".parse::<Jurisdiction>().is_err());
        assert!("loan".parse::<ContractType>().is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut settings = AiSettings {
            provider: "ollama".into(),
            api_key: String::new(),
            model: "llama3".into(),
        };
        assert!(ai_configured(&settings));
        settings.provider = "google".into();
        assert!(!ai_configured(&settings));
        settings.api_key = "k".into();
        assert!(ai_configured(&settings));
    }
}
