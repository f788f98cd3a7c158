//! Static jurisdiction rule table.
//!
//! The table is read once at startup from YAML and never mutated afterwards.
//! Every (jurisdiction, contract type) pair must resolve to a rule, so lookups
//! on a loaded table cannot fail.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::validate::OPTIONAL_REQUEST_FIELDS;
use crate::{ContractType, Jurisdiction};

/// Rules shipped with the crate.
pub const BUILTIN_RULES: &str = include_str!("../rules/jurisdictions.yaml");

#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse rule table: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown jurisdiction '{0}' in rule table")]
    UnknownJurisdiction(String),
    #[error("unknown contract type '{0}' in rule table")]
    UnknownContractType(String),
    #[error("rule table has no entry for jurisdiction '{0}'")]
    MissingJurisdiction(Jurisdiction),
    #[error("rule table has no entry for contract type '{0}'")]
    MissingContractType(ContractType),
    #[error("rule table has no clauses for {jurisdiction}/{contract_type}")]
    MissingClauses {
        jurisdiction: Jurisdiction,
        contract_type: ContractType,
    },
    #[error("rule for {jurisdiction} requires unknown request field '{field}'")]
    UnknownRequiredField {
        jurisdiction: Jurisdiction,
        field: String,
    },
}

/// Everything the validator and prompt composer need for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JurisdictionRule {
    pub jurisdiction: Jurisdiction,
    pub contract_type: ContractType,
    pub jurisdiction_name: String,
    pub legal_framework: String,
    /// Request fields that must be non-empty beyond the always-required ones.
    pub required_fields: Vec<String>,
    pub compliance_clauses: Vec<String>,
    pub contract_clauses: Vec<String>,
    pub required_functions: Vec<String>,
    pub security_hints: Vec<String>,
}

#[derive(Debug)]
pub struct RuleTable {
    rules: HashMap<(Jurisdiction, ContractType), JurisdictionRule>,
}

// YAML shape, keyed by plain strings so unknown names can be reported.

#[derive(Deserialize)]
struct RawTable {
    jurisdictions: BTreeMap<String, RawJurisdiction>,
    contract_types: BTreeMap<String, RawContractType>,
}

#[derive(Deserialize)]
struct RawJurisdiction {
    name: String,
    #[serde(default)]
    legal_framework: String,
    #[serde(default)]
    required_fields: Vec<String>,
    #[serde(default)]
    compliance_rules: Vec<String>,
    #[serde(default)]
    contract_clauses: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    required_fields_by_type: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct RawContractType {
    #[serde(default)]
    required_functions: Vec<String>,
    #[serde(default)]
    security_considerations: Vec<String>,
}

impl RuleTable {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, RuleTableError> {
        Self::from_yaml(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self, RuleTableError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, RuleTableError> {
        let raw: RawTable = serde_yaml::from_str(text)?;

        let mut jurisdictions = HashMap::new();
        for (name, entry) in raw.jurisdictions {
            let j: Jurisdiction = name
                .parse()
                .map_err(|_| RuleTableError::UnknownJurisdiction(name.clone()))?;
            jurisdictions.insert(j, entry);
        }
        let mut types = HashMap::new();
        for (name, entry) in raw.contract_types {
            let t: ContractType = name
                .parse()
                .map_err(|_| RuleTableError::UnknownContractType(name.clone()))?;
            types.insert(t, entry);
        }

        let mut rules = HashMap::new();
        for j in Jurisdiction::ALL {
            let jr = jurisdictions
                .get(&j)
                .ok_or(RuleTableError::MissingJurisdiction(j))?;
            check_clause_keys(jr)?;
            for t in ContractType::ALL {
                let tr = types.get(&t).ok_or(RuleTableError::MissingContractType(t))?;
                let contract_clauses = jr
                    .contract_clauses
                    .get(t.as_str())
                    .cloned()
                    .ok_or(RuleTableError::MissingClauses {
                        jurisdiction: j,
                        contract_type: t,
                    })?;

                let mut required_fields = jr.required_fields.clone();
                if let Some(extra) = jr.required_fields_by_type.get(t.as_str()) {
                    for field in extra {
                        if !required_fields.contains(field) {
                            required_fields.push(field.clone());
                        }
                    }
                }
                if let Some(field) = required_fields
                    .iter()
                    .find(|f| !OPTIONAL_REQUEST_FIELDS.contains(&f.as_str()))
                {
                    return Err(RuleTableError::UnknownRequiredField {
                        jurisdiction: j,
                        field: field.clone(),
                    });
                }

                rules.insert(
                    (j, t),
                    JurisdictionRule {
                        jurisdiction: j,
                        contract_type: t,
                        jurisdiction_name: jr.name.clone(),
                        legal_framework: jr.legal_framework.trim().to_string(),
                        required_fields,
                        compliance_clauses: jr.compliance_rules.clone(),
                        contract_clauses,
                        required_functions: tr.required_functions.clone(),
                        security_hints: tr.security_considerations.clone(),
                    },
                );
            }
        }

        tracing::debug!(entries = rules.len(), "rule table loaded");
        Ok(Self { rules })
    }

    pub fn rule(&self, jurisdiction: Jurisdiction, contract_type: ContractType) -> &JurisdictionRule {
        // Construction guarantees every pair is present.
        &self.rules[&(jurisdiction, contract_type)]
    }

    pub fn jurisdictions(&self) -> Vec<Jurisdiction> {
        Jurisdiction::ALL.to_vec()
    }

    pub fn contract_types(&self) -> Vec<ContractType> {
        ContractType::ALL.to_vec()
    }
}

fn check_clause_keys(jr: &RawJurisdiction) -> Result<(), RuleTableError> {
    for key in jr.contract_clauses.keys().chain(jr.required_fields_by_type.keys()) {
        key.parse::<ContractType>()
            .map_err(|_| RuleTableError::UnknownContractType(key.clone()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_every_pair() {
        let table = RuleTable::builtin().unwrap();
        for j in Jurisdiction::ALL {
            for t in ContractType::ALL {
                let rule = table.rule(j, t);
                assert_eq!(rule.jurisdiction, j);
                assert_eq!(rule.contract_type, t);
                assert!(!rule.compliance_clauses.is_empty());
                assert!(!rule.contract_clauses.is_empty());
                assert!(!rule.security_hints.is_empty());
            }
        }
    }

    #[test]
    fn type_specific_required_fields_are_merged() {
        let table = RuleTable::builtin().unwrap();
        assert!(table
            .rule(Jurisdiction::India, ContractType::Escrow)
            .required_fields
            .is_empty());
        assert_eq!(
            table
                .rule(Jurisdiction::India, ContractType::Settlement)
                .required_fields,
            vec!["payee_address".to_string(), "payer_address".to_string()]
        );
        assert_eq!(
            table.rule(Jurisdiction::Eu, ContractType::Escrow).required_fields,
            vec!["description".to_string()]
        );
    }

    #[test]
    fn unknown_jurisdiction_is_rejected() {
        let yaml = BUILTIN_RULES.replacen("  india:\n", "  mars:\n", 1);
        assert!(matches!(
            RuleTable::from_yaml(&yaml),
            Err(RuleTableError::UnknownJurisdiction(name)) if name == "mars"
        ));
    }

    #[test]
    fn missing_clauses_are_rejected() {
        let yaml = "
jurisdictions:
  india: { name: India, contract_clauses: { escrow: [a], insurance: [b] } }
  eu: { name: EU, contract_clauses: { escrow: [a], insurance: [b], settlement: [c] } }
  us: { name: US, contract_clauses: { escrow: [a], insurance: [b], settlement: [c] } }
contract_types:
  escrow: {}
  insurance: {}
  settlement: {}
";
        assert!(matches!(
            RuleTable::from_yaml(yaml),
            Err(RuleTableError::MissingClauses {
                jurisdiction: Jurisdiction::India,
                contract_type: ContractType::Settlement
            })
        ));
    }

    #[test]
    fn unknown_required_field_is_rejected() {
        let yaml = BUILTIN_RULES.replacen(
            "required_fields: [description]",
            "required_fields: [shoe_size]",
            1,
        );
        assert!(matches!(
            RuleTable::from_yaml(&yaml),
            Err(RuleTableError::UnknownRequiredField { field, .. }) if field == "shoe_size"
        ));
    }
}
