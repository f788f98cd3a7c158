pub mod engine;
mod parse;
mod prompt;

use jurisgen_core::{GeneratedContract, JurisdictionRule, ValidatedRequest};
use tracing::{info, warn};

pub use engine::{ContractGenerator, LlmGenerator, DEFAULT_TIMEOUT};
pub use parse::parse_llm_output;
pub use prompt::{compose_prompt, system_prompt};

/// Why a generation attempt produced no usable contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationFailure {
    #[error("generation provider is not configured: {0}")]
    NotConfigured(String),
    #[error("generation provider error: {0}")]
    Provider(String),
    #[error("generation timed out after {0}s")]
    Timeout(u64),
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("generation response contained no contract code")]
    EmptyCode,
}

impl GenerationFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::NotConfigured(_) => "not_configured",
            GenerationFailure::Provider(_) => "provider",
            GenerationFailure::Timeout(_) => "timeout",
            GenerationFailure::Malformed(_) => "malformed",
            GenerationFailure::EmptyCode => "empty_code",
        }
    }
}

/// Compose the prompt for a validated request, call the generator once and
/// parse its reply. Failures are returned as-is; nothing is retried.
pub async fn generate_contract(
    generator: &dyn ContractGenerator,
    request: &ValidatedRequest,
    rule: &JurisdictionRule,
) -> Result<GeneratedContract, GenerationFailure> {
    let prompt = compose_prompt(request, rule);

    info!(
        jurisdiction = %request.jurisdiction,
        contract_type = %request.contract_type,
        prompt_len = prompt.len(),
        "requesting contract generation"
    );

    let raw = generator.generate(&prompt).await.map_err(|e| {
        warn!(error = %e, "generation call failed");
        e
    })?;

    match parse_llm_output(&raw) {
        Ok(contract) => {
            info!(
                code_len = contract.solidity_code.len(),
                has_deploy_script = !contract.deploy_script.is_empty(),
                has_tests = !contract.tests.is_empty(),
                "parsed generation response"
            );
            Ok(contract)
        }
        Err(e) => {
            warn!(error = %e, raw_len = raw.len(), "could not parse generation response");
            Err(e)
        }
    }
}
