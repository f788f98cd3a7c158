use jurisgen_core::{JurisdictionRule, ValidatedRequest};

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str(":\n");
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
    out.push('\n');
}

fn push_field(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        out.push_str(label);
        out.push_str(": ");
        out.push_str(v);
        out.push('\n');
    }
}

/// Build the user message for one generation request.
///
/// Pure: the same request and rule always yield the same text.
pub fn compose_prompt(request: &ValidatedRequest, rule: &JurisdictionRule) -> String {
    let mut out = String::with_capacity(2048);

    out.push_str("CONTRACT TYPE: ");
    out.push_str(request.contract_type.as_str());
    out.push_str("\nJURISDICTION: ");
    out.push_str(&rule.jurisdiction_name);
    out.push_str(" (");
    out.push_str(request.jurisdiction.as_str());
    out.push_str(")\n\n");

    out.push_str("REQUIREMENTS:\n");
    out.push_str(request.requirements.trim());
    out.push_str("\n\n");

    let has_details = [
        request.description.as_deref(),
        request.payee_address.as_deref(),
        request.payer_address.as_deref(),
    ]
    .iter()
    .any(|v| v.is_some_and(|s| !s.trim().is_empty()));
    if has_details {
        out.push_str("DETAILS:\n");
        push_field(&mut out, "Description", request.description.as_deref());
        push_field(&mut out, "Payee address", request.payee_address.as_deref());
        push_field(&mut out, "Payer address", request.payer_address.as_deref());
        out.push('\n');
    }

    if !rule.legal_framework.is_empty() {
        out.push_str("LEGAL FRAMEWORK:\n");
        out.push_str(&rule.legal_framework);
        out.push_str("\n\n");
    }

    push_list(&mut out, "COMPLIANCE REQUIREMENTS", &rule.compliance_clauses);
    push_list(&mut out, "CONTRACT CLAUSES", &rule.contract_clauses);
    push_list(&mut out, "REQUIRED FUNCTIONS", &rule.required_functions);
    push_list(&mut out, "SECURITY CONSIDERATIONS", &rule.security_hints);

    out.push_str(
        "Return the JSON object described in your instructions. The contract must compile \
with Solidity ^0.8.19 and satisfy every requirement above.",
    );
    out
}

pub fn system_prompt() -> String {
    format!(
        "You are an expert Solidity engineer who writes jurisdiction-aware smart contracts \
for escrow, insurance and settlement agreements.\n\n\
Every contract you write must:\n\
- Start with an SPDX license identifier and `pragma solidity ^{SOLIDITY_VERSION};`\n\
- Emit events for every state change so off-chain systems can audit it\n\
- Guard value transfers against reentrancy and use checks-effects-interactions\n\
- Use custom errors or require messages that explain each rejected call\n\
- Restrict privileged functions with explicit access control\n\
- Encode the listed compliance requirements and clauses as concrete checks, \
not comments\n\n\
Do NOT:\n\
- Import packages that are not available on a plain solc install\n\
- Leave placeholder functions or TODO bodies\n\
- Store personal data on-chain\n\n\
Output ONLY a JSON object inside a ```json fence with these keys:\n\
{{\"solidity_code\":\"<full contract source>\",\
\"deploy_script\":\"<ethers.js deployment script>\",\
\"tests\":\"<hardhat tests>\",\
\"metadata\":{{\"contract_name\":\"<main contract name>\",\
\"compliance_features\":[\"...\"],\"security_features\":[\"...\"]}}}}\n\n\
Output ONLY the fenced JSON object, nothing else."
    )
}

const SOLIDITY_VERSION: &str = "0.8.19";

#[cfg(test)]
mod tests {
    use jurisgen_core::{ContractType, Jurisdiction, RuleTable};

    use super::*;

    fn request(jurisdiction: Jurisdiction, contract_type: ContractType) -> ValidatedRequest {
        ValidatedRequest {
            jurisdiction,
            contract_type,
            requirements: "  Freelance payment escrow  ".into(),
            description: Some("Website build".into()),
            payee_address: None,
            payer_address: Some("   ".into()),
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let rules = RuleTable::builtin().unwrap();
        let rule = rules.rule(Jurisdiction::Eu, ContractType::Insurance);
        let req = request(Jurisdiction::Eu, ContractType::Insurance);
        assert_eq!(compose_prompt(&req, rule), compose_prompt(&req, rule));
    }

    #[test]
    fn prompt_carries_request_and_rule() {
        let rules = RuleTable::builtin().unwrap();
        let rule = rules.rule(Jurisdiction::India, ContractType::Escrow);
        let prompt = compose_prompt(&request(Jurisdiction::India, ContractType::Escrow), rule);

        assert!(prompt.starts_with("CONTRACT TYPE: escrow\nJURISDICTION: India (india)\n"));
        assert!(prompt.contains("REQUIREMENTS:\nFreelance payment escrow\n"));
        assert!(prompt.contains("Description: Website build\n"));
        assert!(!prompt.contains("Payer address"));
        assert!(!prompt.contains("Payee address"));
        assert!(prompt.contains(&rule.legal_framework));
        for clause in rule
            .compliance_clauses
            .iter()
            .chain(&rule.contract_clauses)
            .chain(&rule.required_functions)
            .chain(&rule.security_hints)
        {
            assert!(prompt.contains(clause.as_str()), "missing {clause}");
        }
    }

    #[test]
    fn different_jurisdictions_produce_different_prompts() {
        let rules = RuleTable::builtin().unwrap();
        let india = compose_prompt(
            &request(Jurisdiction::India, ContractType::Escrow),
            rules.rule(Jurisdiction::India, ContractType::Escrow),
        );
        let us = compose_prompt(
            &request(Jurisdiction::Us, ContractType::Escrow),
            rules.rule(Jurisdiction::Us, ContractType::Escrow),
        );
        assert_ne!(india, us);
    }

    #[test]
    fn system_prompt_asks_for_json_object() {
        let prompt = system_prompt();
        assert!(prompt.contains("pragma solidity ^0.8.19;"));
        assert!(prompt.contains("\"solidity_code\""));
        assert!(prompt.contains("```json"));
    }
}
