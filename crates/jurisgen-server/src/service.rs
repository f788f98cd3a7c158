//! Request-scoped orchestration over the rule table, generator and store.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use jurisgen_core::lifecycle::{self, StatusUpdateError};
use jurisgen_core::validate::{address_warnings, validate, validate_report};
use jurisgen_core::{
    ContractFilter, ContractRecord, ContractStatus, ContractStore, ContractType, GenerationRequest,
    Jurisdiction, RuleTable, StateTransitionError, StatusChange, StatusCounts, StatusUpdate,
    StoreError, ValidationFailure, ValidationReport,
};

use jurisgen_generate::{generate_contract, ContractGenerator, GenerationFailure};

use crate::deploy::{
    self, BytecodeResponse, ConfirmDeployment, DeploymentPayload, GasEstimate, GasEstimateRequest,
    PrepareError,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("Contract {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Transition(#[from] StateTransitionError),
    #[error(transparent)]
    StatusUpdate(#[from] StatusUpdateError),
    #[error(transparent)]
    InvalidState(#[from] PrepareError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    #[error(transparent)]
    Store(StoreError),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::Transition { source, .. } => ServiceError::Transition(source),
            other => ServiceError::Store(other),
        }
    }
}

/// Optional list filters as they arrive in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn parse_filter<T: std::str::FromStr>(name: &str, raw: &Option<String>) -> Result<Option<T>, ServiceError> {
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ServiceError::BadRequest(format!("Invalid {name} filter '{value}'"))),
        None => Ok(None),
    }
}

impl ListQuery {
    pub fn to_filter(&self) -> Result<ContractFilter, ServiceError> {
        Ok(ContractFilter {
            jurisdiction: parse_filter::<Jurisdiction>("jurisdiction", &self.jurisdiction)?,
            contract_type: parse_filter::<ContractType>("contract_type", &self.contract_type)?,
            status: parse_filter::<ContractStatus>("status", &self.status)?,
        })
    }
}

pub struct ContractService {
    store: ContractStore,
    rules: Arc<RuleTable>,
    generator: Arc<dyn ContractGenerator>,
}

impl ContractService {
    pub fn new(store: ContractStore, rules: Arc<RuleTable>, generator: Arc<dyn ContractGenerator>) -> Self {
        Self {
            store,
            rules,
            generator,
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Run a store call on the blocking pool; rusqlite is synchronous.
    async fn with_store<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&ContractStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
    }

    // --- Generation ---

    /// Dry-run of the validator; never touches the store.
    pub fn validate(&self, request: &GenerationRequest) -> ValidationReport {
        validate_report(request, &self.rules)
    }

    /// Validate, generate and persist a new draft. Nothing is stored unless
    /// generation succeeds.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<ContractRecord, ServiceError> {
        let validated = validate(request, &self.rules).map_err(|failure| {
            warn!(issues = ?failure.messages(), "rejected generation request");
            failure
        })?;
        for warning in address_warnings(request) {
            warn!(%warning, "accepted request with suspicious address");
        }

        let rule = self.rules.rule(validated.jurisdiction, validated.contract_type);
        let generated = generate_contract(self.generator.as_ref(), &validated, rule)
            .await
            .map_err(|failure| {
                warn!(
                    jurisdiction = %validated.jurisdiction,
                    contract_type = %validated.contract_type,
                    kind = failure.kind(),
                    error = %failure,
                    "generation failed; no record stored"
                );
                failure
            })?;

        let record = self
            .with_store(move |store| store.insert_draft(&validated, &generated))
            .await?;
        info!(
            contract_id = record.id,
            jurisdiction = %record.jurisdiction,
            contract_type = %record.contract_type,
            "contract generated"
        );
        Ok(record)
    }

    /// Re-run generation for a failed record, returning it to draft on success.
    ///
    /// On failure the reason is noted only if the record is still failed, and
    /// the generation error is what the caller sees.
    pub async fn regenerate(&self, id: i64) -> Result<ContractRecord, ServiceError> {
        let record = self.get(id).await?;
        lifecycle::check(record.status, &StatusChange::Retry)?;

        let request = record.request();
        let rule = self.rules.rule(request.jurisdiction, request.contract_type);
        match generate_contract(self.generator.as_ref(), &request, rule).await {
            Ok(generated) => {
                let record = self
                    .with_store(move |store| store.replace_generation(id, &generated))
                    .await?;
                info!(contract_id = id, "contract regenerated");
                Ok(record)
            }
            Err(failure) => {
                warn!(contract_id = id, kind = failure.kind(), error = %failure, "regeneration failed");
                let reason = failure.to_string();
                match self.with_store(move |store| store.note_failure(id, &reason)).await {
                    Ok(Some(_)) => {}
                    Ok(None) => info!(contract_id = id, "record left failed state during regeneration"),
                    Err(err) => warn!(contract_id = id, error = %err, "could not record failure reason"),
                }
                Err(failure.into())
            }
        }
    }

    // --- Records ---

    pub async fn get(&self, id: i64) -> Result<ContractRecord, ServiceError> {
        self.with_store(move |store| store.get(id))
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<ContractRecord>, ServiceError> {
        let filter = query.to_filter()?;
        self.with_store(move |store| store.list(&filter)).await
    }

    pub async fn stats(&self) -> Result<StatusCounts, ServiceError> {
        self.with_store(|store| store.count_by_status()).await
    }

    pub async fn update_status(&self, id: i64, update: StatusUpdate) -> Result<ContractRecord, ServiceError> {
        let change = update.into_change()?;
        let target = change.target();
        let record = self
            .with_store(move |store| store.update_status(id, change))
            .await
            .map_err(|err| {
                warn!(contract_id = id, %target, error = %err, "status update rejected");
                err
            })?;
        info!(contract_id = id, status = %record.status, "contract status updated");
        Ok(record)
    }

    // --- Deployment ---

    pub async fn prepare_deployment(&self, id: i64) -> Result<DeploymentPayload, ServiceError> {
        let record = self.get(id).await?;
        Ok(deploy::prepare(&record)?)
    }

    pub async fn confirm_deployment(
        &self,
        id: i64,
        confirm: ConfirmDeployment,
    ) -> Result<ContractRecord, ServiceError> {
        let change = confirm.into_change();
        let record = self
            .with_store(move |store| store.update_status(id, change))
            .await
            .map_err(|err| {
                warn!(contract_id = id, error = %err, "deployment confirmation rejected");
                err
            })?;
        info!(
            contract_id = id,
            transaction_hash = record.transaction_hash.as_deref().unwrap_or_default(),
            contract_address = record.contract_address.as_deref().unwrap_or_default(),
            "deployment confirmed"
        );
        Ok(record)
    }

    pub async fn bytecode(&self, id: i64) -> Result<BytecodeResponse, ServiceError> {
        Ok(deploy::bytecode(&self.get(id).await?))
    }

    pub fn estimate_gas(&self, request: &GasEstimateRequest) -> GasEstimate {
        deploy::estimate_gas(request)
    }
}

#[cfg(test)]
mod tests {
    use jurisgen_core::{GeneratedContract, ValidatedRequest};

    use super::*;

    #[test]
    fn list_query_parses_filters() {
        let query = ListQuery {
            jurisdiction: Some("EU".into()),
            contract_type: Some(" ".into()),
            status: Some("deployed".into()),
        };
        assert_eq!(
            query.to_filter().unwrap(),
            ContractFilter {
                jurisdiction: Some(Jurisdiction::Eu),
                contract_type: None,
                status: Some(ContractStatus::Deployed),
            }
        );
    }

    #[test]
    fn list_query_rejects_unknown_values() {
        let query = ListQuery {
            status: Some("archived".into()),
            ..Default::default()
        };
        match query.to_filter() {
            Err(ServiceError::BadRequest(msg)) => assert_eq!(msg, "Invalid status filter 'archived'"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn store_errors_map_to_service_errors() {
        assert!(matches!(ServiceError::from(StoreError::NotFound(3)), ServiceError::NotFound(3)));
        assert!(matches!(
            ServiceError::from(StoreError::Transition {
                id: 3,
                source: StateTransitionError::Terminal
            }),
            ServiceError::Transition(StateTransitionError::Terminal)
        ));
        assert!(matches!(ServiceError::from(StoreError::Poisoned), ServiceError::Store(_)));
    }

    // Moves the record back to draft while "generating", then fails.
    struct RacingRetry {
        store: ContractStore,
        id: i64,
    }

    #[async_trait::async_trait]
    impl ContractGenerator for RacingRetry {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationFailure> {
            self.store
                .update_status(self.id, StatusChange::Retry)
                .map_err(|e| GenerationFailure::Provider(e.to_string()))?;
            Err(GenerationFailure::Timeout(30))
        }
    }

    fn failed_record(store: &ContractStore) -> ContractRecord {
        let request = ValidatedRequest {
            jurisdiction: Jurisdiction::India,
            contract_type: ContractType::Escrow,
            requirements: "Freelance payment escrow".into(),
            description: None,
            payee_address: None,
            payer_address: None,
        };
        let generated = GeneratedContract {
            solidity_code: "contract Escrow {}".into(),
            ..Default::default()
        };
        let record = store.insert_draft(&request, &generated).unwrap();
        store
            .update_status(record.id, StatusChange::Fail { reason: Some("wallet rejected".into()) })
            .unwrap()
    }

    #[tokio::test]
    async fn failed_regeneration_does_not_annotate_a_record_moved_to_draft() {
        let store = ContractStore::open_in_memory().unwrap();
        let record = failed_record(&store);
        let service = ContractService::new(
            store.clone(),
            Arc::new(RuleTable::builtin().unwrap()),
            Arc::new(RacingRetry {
                store: store.clone(),
                id: record.id,
            }),
        );

        let err = service.regenerate(record.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Generation(GenerationFailure::Timeout(30))));

        let current = service.get(record.id).await.unwrap();
        assert_eq!(current.status, ContractStatus::Draft);
        assert!(!current.metadata.contains_key("failure_reason"));
    }
}
