//! Deployment payloads for client-side wallet signing.
//!
//! Nothing here signs, holds keys or talks to a chain. The bytecode is a
//! placeholder until contracts are compiled server-side.

use serde::{Deserialize, Serialize};

use jurisgen_core::validate::is_address_shaped;
use jurisgen_core::{gas, ContractRecord, ContractStatus, ContractType, Jurisdiction, Metadata, StatusChange};

pub const PLACEHOLDER_BYTECODE: &str =
    "0x608060405234801561001057600080fd5b50600080fdfea2646970667358221220";

const COMPILER_VERSION: &str = "0.8.19";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrepareError {
    #[error("Contract {id} is {status}; only draft contracts can be deployed")]
    InvalidState { id: i64, status: ContractStatus },
}

/// Unsigned contract-creation transaction for the wallet to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Always null: contract creation.
    pub to: Option<String>,
    pub value: String,
    pub data: String,
    pub gas: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentData {
    pub contract_id: i64,
    pub contract_name: String,
    pub jurisdiction: Jurisdiction,
    pub contract_type: ContractType,
    pub solidity_code: String,
    pub deploy_script: String,
    pub bytecode: String,
    pub abi: Vec<serde_json::Value>,
    pub constructor_params: Vec<String>,
    pub estimated_gas: u64,
    pub metadata: Metadata,
    pub transaction: UnsignedTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentInstructions {
    pub step1: String,
    pub step2: String,
    pub step3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentPayload {
    pub deployment_data: DeploymentData,
    pub instructions: DeploymentInstructions,
}

fn constructor_params(record: &ContractRecord) -> Vec<String> {
    [&record.payee_address, &record.payer_address]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
}

fn gas_hex(gas: u64) -> String {
    format!("{gas:#x}")
}

/// Build the signable payload for a draft record.
pub fn prepare(record: &ContractRecord) -> Result<DeploymentPayload, PrepareError> {
    if record.status != ContractStatus::Draft {
        return Err(PrepareError::InvalidState {
            id: record.id,
            status: record.status,
        });
    }
    let estimated_gas = gas::estimate(record.contract_type, record.jurisdiction);
    Ok(DeploymentPayload {
        deployment_data: DeploymentData {
            contract_id: record.id,
            contract_name: record.contract_name().to_string(),
            jurisdiction: record.jurisdiction,
            contract_type: record.contract_type,
            solidity_code: record.solidity_code.clone(),
            deploy_script: record.deploy_script.clone(),
            bytecode: PLACEHOLDER_BYTECODE.to_string(),
            abi: Vec::new(),
            constructor_params: constructor_params(record),
            estimated_gas,
            metadata: record.metadata.clone(),
            transaction: UnsignedTransaction {
                from: record
                    .payer_address
                    .clone()
                    .filter(|address| is_address_shaped(address)),
                to: None,
                value: "0x0".into(),
                data: PLACEHOLDER_BYTECODE.to_string(),
                gas: gas_hex(estimated_gas),
            },
        },
        instructions: DeploymentInstructions {
            step1: "Compile the Solidity code using your preferred method".into(),
            step2: "Deploy using MetaMask with the provided constructor parameters".into(),
            step3: format!(
                "Call /api/deploy/{}/confirm with the transaction hash and contract address after deployment",
                record.id
            ),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BytecodeResponse {
    pub contract_id: i64,
    pub contract_name: String,
    pub bytecode: String,
    pub abi: Vec<serde_json::Value>,
    pub constructor_params: Vec<String>,
    pub compiler_version: String,
    pub note: String,
}

pub fn bytecode(record: &ContractRecord) -> BytecodeResponse {
    BytecodeResponse {
        contract_id: record.id,
        contract_name: record.contract_name().to_string(),
        bytecode: PLACEHOLDER_BYTECODE.to_string(),
        abi: Vec::new(),
        constructor_params: constructor_params(record),
        compiler_version: COMPILER_VERSION.into(),
        note: "This is placeholder bytecode. Compile the Solidity code before deploying.".into(),
    }
}

/// Body of a deployment confirmation. Values are taken on trust from the wallet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmDeployment {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub gas_used: Option<u64>,
}

impl ConfirmDeployment {
    pub fn into_change(self) -> StatusChange {
        StatusChange::Deploy {
            transaction_hash: self.transaction_hash.unwrap_or_default(),
            contract_address: self.contract_address.unwrap_or_default(),
            gas_used: self.gas_used,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasEstimateRequest {
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasEstimate {
    pub estimated_gas: u64,
    pub estimated_gas_hex: String,
    pub contract_type: String,
    pub jurisdiction: String,
    pub note: String,
}

/// Missing fields are treated as empty and fall back to [`gas::DEFAULT_GAS`].
pub fn estimate_gas(request: &GasEstimateRequest) -> GasEstimate {
    let normalize = |field: &Option<String>| {
        field
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default()
    };
    let contract_type = normalize(&request.contract_type);
    let jurisdiction = normalize(&request.jurisdiction);
    let estimated_gas = gas::estimate_raw(&contract_type, &jurisdiction);
    GasEstimate {
        estimated_gas,
        estimated_gas_hex: gas_hex(estimated_gas),
        contract_type,
        jurisdiction,
        note: "Gas estimates are approximate and may vary based on network conditions".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ContractStatus) -> ContractRecord {
        let at = jurisgen_core::now();
        let deployed = status == ContractStatus::Deployed;
        let mut metadata = Metadata::new();
        metadata.insert("contract_name".into(), "FreelanceEscrow".into());
        ContractRecord {
            id: 7,
            jurisdiction: Jurisdiction::India,
            contract_type: ContractType::Escrow,
            requirements: "Freelance payment escrow".into(),
            description: None,
            payee_address: Some("0x00000000000000000000000000000000000000aa".into()),
            payer_address: Some("0x00000000000000000000000000000000000000bb".into()),
            solidity_code: "contract FreelanceEscrow {}".into(),
            deploy_script: String::new(),
            tests: String::new(),
            metadata,
            status,
            transaction_hash: deployed.then(|| "0xabc".to_string()),
            contract_address: deployed.then(|| "0xdef".to_string()),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn draft_yields_unsigned_creation_transaction() {
        let payload = prepare(&record(ContractStatus::Draft)).unwrap();
        let data = &payload.deployment_data;
        assert_eq!(data.contract_name, "FreelanceEscrow");
        assert_eq!(data.estimated_gas, 1_600_000);
        assert_eq!(data.constructor_params.len(), 2);
        assert_eq!(data.transaction.to, None);
        assert_eq!(data.transaction.value, "0x0");
        assert_eq!(data.transaction.data, PLACEHOLDER_BYTECODE);
        assert_eq!(data.transaction.gas, "0x186a00");
        assert!(payload.instructions.step3.contains("/api/deploy/7/confirm"));

        assert_eq!(
            data.transaction.from.as_deref(),
            Some("0x00000000000000000000000000000000000000bb")
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["deployment_data"]["transaction"]["to"].is_null());
    }

    #[test]
    fn malformed_payer_is_not_used_as_sender() {
        let mut draft = record(ContractStatus::Draft);
        draft.payer_address = Some("0x123".into());
        let payload = prepare(&draft).unwrap();
        assert_eq!(payload.deployment_data.transaction.from, None);
        assert_eq!(payload.deployment_data.constructor_params[1], "0x123");

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["deployment_data"]["transaction"].get("from").is_none());
    }

    #[test]
    fn only_drafts_can_be_prepared() {
        for status in [ContractStatus::Deployed, ContractStatus::Failed] {
            assert_eq!(
                prepare(&record(status)),
                Err(PrepareError::InvalidState { id: 7, status })
            );
        }
    }

    #[test]
    fn bytecode_is_available_in_any_state() {
        let response = bytecode(&record(ContractStatus::Deployed));
        assert_eq!(response.bytecode, PLACEHOLDER_BYTECODE);
        assert!(response.abi.is_empty());
        assert_eq!(response.compiler_version, "0.8.19");
    }

    #[test]
    fn gas_estimate_normalizes_input() {
        let estimate = estimate_gas(&GasEstimateRequest {
            contract_type: Some(" Insurance ".into()),
            jurisdiction: Some("EU".into()),
        });
        assert_eq!(estimate.estimated_gas, 2_200_000);
        assert_eq!(estimate.contract_type, "insurance");
        assert_eq!(estimate.jurisdiction, "eu");

    }

    #[test]
    fn gas_estimate_without_input_uses_default() {
        let fallback = estimate_gas(&GasEstimateRequest::default());
        assert_eq!(fallback.estimated_gas, gas::DEFAULT_GAS);
        assert_eq!(fallback.estimated_gas_hex, "0x16e360");
        assert!(fallback.contract_type.is_empty());
        assert!(fallback.jurisdiction.is_empty());

        let type_only = estimate_gas(&GasEstimateRequest {
            contract_type: Some("settlement".into()),
            jurisdiction: None,
        });
        assert_eq!(type_only.estimated_gas, 1_800_000);
        assert!(type_only.jurisdiction.is_empty());
    }

    #[test]
    fn confirmation_maps_to_deploy_change() {
        let change = ConfirmDeployment {
            transaction_hash: Some("0xabc".into()),
            contract_address: None,
            gas_used: Some(1_234_567),
        }
        .into_change();
        assert_eq!(
            change,
            StatusChange::Deploy {
                transaction_hash: "0xabc".into(),
                contract_address: String::new(),
                gas_used: Some(1_234_567),
            }
        );
    }
}
