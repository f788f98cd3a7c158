//! Generation request validation against the rule table.

use serde::{Deserialize, Serialize};

use crate::rules::RuleTable;
use crate::{ContractType, Jurisdiction};

/// Fields every request must carry regardless of jurisdiction.
pub const BASE_REQUIRED_FIELDS: [&str; 3] = ["jurisdiction", "contract_type", "requirements"];

/// Optional request fields a jurisdiction rule may promote to required.
pub const OPTIONAL_REQUEST_FIELDS: [&str; 4] =
    ["requirements", "description", "payee_address", "payer_address"];

/// A generation request as received from the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationRequest {
    /// One of "india", "eu", "us"
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// One of "escrow", "insurance", "settlement"
    #[serde(default)]
    pub contract_type: Option<String>,
    /// Free-text description of what the contract must do
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 0x-prefixed address of the receiving party
    #[serde(default)]
    pub payee_address: Option<String>,
    /// 0x-prefixed address of the paying party
    #[serde(default)]
    pub payer_address: Option<String>,
}

impl GenerationRequest {
    /// Trimmed, non-empty value of a named field.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "jurisdiction" => &self.jurisdiction,
            "contract_type" => &self.contract_type,
            "requirements" => &self.requirements,
            "description" => &self.description,
            "payee_address" => &self.payee_address,
            "payer_address" => &self.payer_address,
            _ => return None,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A request that passed validation: enumerations typed, text trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedRequest {
    pub jurisdiction: Jurisdiction,
    pub contract_type: ContractType,
    pub requirements: String,
    pub description: Option<String>,
    pub payee_address: Option<String>,
    pub payer_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ValidationIssue {
    #[error("Invalid jurisdiction '{0}'. Valid options: india, eu, us")]
    InvalidJurisdiction(String),
    #[error("Invalid contract type '{0}'. Valid options: escrow, insurance, settlement")]
    InvalidContractType(String),
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
}

impl ValidationIssue {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationIssue::InvalidJurisdiction(_) => "invalid_jurisdiction",
            ValidationIssue::InvalidContractType(_) => "invalid_contract_type",
            ValidationIssue::MissingRequiredField(_) => "missing_required_field",
        }
    }

    /// Name of the request field the issue concerns.
    pub fn field(&self) -> &str {
        match self {
            ValidationIssue::InvalidJurisdiction(_) => "jurisdiction",
            ValidationIssue::InvalidContractType(_) => "contract_type",
            ValidationIssue::MissingRequiredField(name) => name,
        }
    }
}

/// Every problem found in a request, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation failed: {}", self.messages().join(", "))]
pub struct ValidationFailure {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

/// Dry-run output of the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn validate(
    request: &GenerationRequest,
    rules: &RuleTable,
) -> Result<ValidatedRequest, ValidationFailure> {
    let mut issues = Vec::new();

    for field in BASE_REQUIRED_FIELDS {
        if request.field(field).is_none() {
            issues.push(ValidationIssue::MissingRequiredField(field.to_string()));
        }
    }

    let jurisdiction = match request.field("jurisdiction").map(|raw| (raw, raw.parse::<Jurisdiction>())) {
        Some((_, Ok(j))) => Some(j),
        Some((raw, Err(_))) => {
            issues.push(ValidationIssue::InvalidJurisdiction(raw.to_string()));
            None
        }
        None => None,
    };
    let contract_type = match request.field("contract_type").map(|raw| (raw, raw.parse::<ContractType>())) {
        Some((_, Ok(t))) => Some(t),
        Some((raw, Err(_))) => {
            issues.push(ValidationIssue::InvalidContractType(raw.to_string()));
            None
        }
        None => None,
    };

    if let (Some(j), Some(t)) = (jurisdiction, contract_type) {
        for field in &rules.rule(j, t).required_fields {
            let issue = ValidationIssue::MissingRequiredField(field.clone());
            if request.field(field).is_none() && !issues.contains(&issue) {
                issues.push(issue);
            }
        }
    }

    match (jurisdiction, contract_type, request.field("requirements")) {
        (Some(jurisdiction), Some(contract_type), Some(requirements)) if issues.is_empty() => {
            Ok(ValidatedRequest {
                jurisdiction,
                contract_type,
                requirements: requirements.to_string(),
                description: request.field("description").map(str::to_string),
                payee_address: request.field("payee_address").map(str::to_string),
                payer_address: request.field("payer_address").map(str::to_string),
            })
        }
        _ => Err(ValidationFailure { issues }),
    }
}

pub fn validate_report(request: &GenerationRequest, rules: &RuleTable) -> ValidationReport {
    let errors = match validate(request, rules) {
        Ok(_) => Vec::new(),
        Err(failure) => failure.messages(),
    };
    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings: address_warnings(request),
    }
}

/// Non-fatal warnings for addresses that do not look like `0x` + 40 hex digits.
pub fn address_warnings(request: &GenerationRequest) -> Vec<String> {
    ["payee_address", "payer_address"]
        .into_iter()
        .filter_map(|field| {
            let value = request.field(field)?;
            (!is_address_shaped(value))
                .then(|| format!("Invalid Ethereum address format for {field}"))
        })
        .collect()
}

pub fn is_address_shaped(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}
