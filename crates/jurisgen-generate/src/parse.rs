use jurisgen_core::{GeneratedContract, Metadata};
use serde_json::Value;

use crate::GenerationFailure;

// Fields are optional and nullable; models often send `"tests": null`.
#[derive(serde::Deserialize)]
struct LlmContract {
    #[serde(alias = "code", alias = "contract", default)]
    solidity_code: Option<String>,
    #[serde(alias = "deployment_script", default)]
    deploy_script: Option<String>,
    #[serde(alias = "test_code", default)]
    tests: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl LlmContract {
    fn into_contract(self) -> GeneratedContract {
        GeneratedContract {
            solidity_code: strip_fence(self.solidity_code.as_deref().unwrap_or_default()),
            deploy_script: strip_fence(self.deploy_script.as_deref().unwrap_or_default()),
            tests: strip_fence(self.tests.as_deref().unwrap_or_default()),
            metadata: self.metadata.unwrap_or_default(),
        }
    }
}

/// Parse raw LLM output into a generated contract.
///
/// The reply is read as the requested JSON object first; if there is none,
/// language-tagged code fences are used instead. There is no template
/// fallback: output without contract code is an error.
pub fn parse_llm_output(raw: &str) -> Result<GeneratedContract, GenerationFailure> {
    let mut json_error = None;
    let mut parsed = None;
    for candidate in json_candidates(raw) {
        match serde_json::from_str::<LlmContract>(&candidate) {
            Ok(found) => {
                parsed = Some(found);
                break;
            }
            Err(e) => {
                json_error.get_or_insert(e);
            }
        }
    }

    let mut contract = match (parsed, json_error) {
        (Some(found), _) => found.into_contract(),
        (None, Some(e)) => from_fences(raw).ok_or_else(|| {
            GenerationFailure::Malformed(format!("invalid JSON object: {e}"))
        })?,
        (None, None) => from_fences(raw).ok_or_else(|| {
            GenerationFailure::Malformed("no JSON object or solidity code block found".into())
        })?,
    };

    if contract.solidity_code.trim().is_empty() {
        return Err(GenerationFailure::EmptyCode);
    }

    let has_name = contract
        .metadata
        .get("contract_name")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_name {
        if let Some(name) = contract_name(&contract.solidity_code) {
            contract
                .metadata
                .insert("contract_name".into(), Value::String(name));
        }
    }

    Ok(contract)
}

/// JSON object texts to try, in order.
///
/// With a ```json fence the fence body comes first. A value holding its own
/// fence ends that body early, so the span from the first `{` after the
/// opener to the last `}` in the reply follows. Without a fence, only the
/// bare brace span is tried.
fn json_candidates(raw: &str) -> Vec<String> {
    let Some(body_start) = json_fence_body(raw) else {
        return bare_object(raw).into_iter().collect();
    };

    let mut candidates = Vec::with_capacity(2);
    if let Some((_, body)) = fenced_blocks(raw)
        .into_iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case("json"))
    {
        candidates.push(body);
    }
    let tail = &raw[body_start..];
    if let (Some(start), Some(end)) = (tail.find('{'), tail.rfind('}')) {
        if start < end {
            let span = tail[start..=end].to_string();
            if !candidates.contains(&span) {
                candidates.push(span);
            }
        }
    }
    candidates
}

/// Byte offset just past the opening line of the first ```json fence.
fn json_fence_body(raw: &str) -> Option<usize> {
    raw.match_indices("```").find_map(|(open, _)| {
        let after = &raw[open + 3..];
        let line_end = after.find('\n')?;
        after[..line_end]
            .trim()
            .eq_ignore_ascii_case("json")
            .then_some(open + 3 + line_end + 1)
    })
}

fn bare_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &raw[start..=end];
    // A bare solidity reply also has braces; only treat it as JSON if it
    // starts like an object with a quoted key.
    if candidate[1..].trim_start().starts_with('"') {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn from_fences(raw: &str) -> Option<GeneratedContract> {
    let blocks = fenced_blocks(raw);
    let solidity = blocks
        .iter()
        .find(|(lang, _)| matches!(lang.to_ascii_lowercase().as_str(), "solidity" | "sol"))?;

    let mut scripts = blocks.iter().filter(|(lang, _)| {
        matches!(
            lang.to_ascii_lowercase().as_str(),
            "javascript" | "js" | "typescript" | "ts"
        )
    });
    let deploy_script = scripts.next().map(|(_, body)| body.clone()).unwrap_or_default();
    let tests = scripts.next().map(|(_, body)| body.clone()).unwrap_or_default();

    Some(GeneratedContract {
        solidity_code: solidity.1.clone(),
        deploy_script,
        tests,
        metadata: Metadata::new(),
    })
}

/// All ``` fenced blocks as (language tag, body) pairs.
fn fenced_blocks(raw: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(line_end) = after.find('\n') else {
            break;
        };
        let lang = after[..line_end].trim().to_string();
        let body_start = &after[line_end + 1..];
        let Some(close) = body_start.find("```") else {
            break;
        };
        blocks.push((lang, body_start[..close].trim_end().to_string()));
        rest = &body_start[close + 3..];
    }
    blocks
}

/// Models sometimes wrap field values in their own fences.
fn strip_fence(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with("```") {
        if let Some((_, body)) = fenced_blocks(trimmed).into_iter().next() {
            return body;
        }
    }
    trimmed.to_string()
}

/// First `contract <Name>` declaration, skipping interfaces and libraries.
fn contract_name(code: &str) -> Option<String> {
    code.lines().find_map(|line| {
        let line = line.trim_start();
        let rest = line
            .strip_prefix("abstract contract ")
            .or_else(|| line.strip_prefix("contract "))?;
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        (!name.is_empty()).then_some(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_object() {
        let raw = r#"Here you go:
```json
{
  "solidity_code": "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.19;\ncontract IndiaEscrow {}",
  "deploy_script": "const f = await ethers.getContractFactory('IndiaEscrow');",
  "tests": "describe('IndiaEscrow', () => {});",
  "metadata": {"contract_name": "IndiaEscrow", "security_features": ["ReentrancyGuard"]}
}
```
"#;
        let contract = parse_llm_output(raw).unwrap();
        assert!(contract.solidity_code.contains("contract IndiaEscrow {}"));
        assert!(contract.deploy_script.starts_with("const f"));
        assert_eq!(contract.tests, "describe('IndiaEscrow', () => {});");
        assert_eq!(contract.metadata["contract_name"], "IndiaEscrow");
        assert_eq!(contract.metadata["security_features"][0], "ReentrancyGuard");
    }

    #[test]
    fn parses_bare_json_with_aliases() {
        let raw = r#"{"code": "```solidity\ncontract Policy {}\n```"}"#;
        let contract = parse_llm_output(raw).unwrap();
        assert_eq!(contract.solidity_code, "contract Policy {}");
        assert_eq!(contract.metadata["contract_name"], "Policy");
        assert!(contract.deploy_script.is_empty());
    }

    #[test]
    fn fenced_values_inside_json_fence() {
        let raw = "```json\n{\"solidity_code\": \"```solidity\\ncontract A {}\\n```\", \
\"deploy_script\": \"```javascript\\ndeploy();\\n```\", \"tests\": \"it()\", \"metadata\": {}}\n```\n";
        let contract = parse_llm_output(raw).unwrap();
        assert_eq!(contract.solidity_code, "contract A {}");
        assert_eq!(contract.deploy_script, "deploy();");
        assert_eq!(contract.tests, "it()");
        assert_eq!(contract.metadata["contract_name"], "A");
    }

    #[test]
    fn null_optional_fields_are_empty() {
        let raw = r#"{"solidity_code":"contract A {}","deploy_script":null,"tests":null,"metadata":null}"#;
        let contract = parse_llm_output(raw).unwrap();
        assert_eq!(contract.solidity_code, "contract A {}");
        assert!(contract.deploy_script.is_empty());
        assert!(contract.tests.is_empty());
        assert_eq!(contract.metadata["contract_name"], "A");

        assert_eq!(
            parse_llm_output(r#"{"solidity_code": null, "tests": "x"}"#),
            Err(GenerationFailure::EmptyCode)
        );
    }

    #[test]
    fn falls_back_to_language_fences() {
        let raw = "Contract:\n```solidity\ncontract Settlement {\n  uint x;\n}\n```\n\
Deploy:\n```javascript\nconsole.log('deploy');\n```\n\
Tests:\n```js\nit('works');\n```\n";
        let contract = parse_llm_output(raw).unwrap();
        assert_eq!(contract.solidity_code, "contract Settlement {\n  uint x;\n}");
        assert_eq!(contract.deploy_script, "console.log('deploy');");
        assert_eq!(contract.tests, "it('works');");
        assert_eq!(contract.metadata["contract_name"], "Settlement");
    }

    #[test]
    fn name_skips_interfaces() {
        let code = "interface IERC20 {}\nlibrary SafeMath {}\nabstract contract Base {}\ncontract Main is Base {}";
        assert_eq!(contract_name(code).as_deref(), Some("Base"));
        assert_eq!(contract_name("interface I {}"), None);
    }

    #[test]
    fn prose_without_code_is_malformed() {
        assert!(matches!(
            parse_llm_output("Sorry, I cannot help with that."),
            Err(GenerationFailure::Malformed(_))
        ));
    }

    #[test]
    fn broken_json_without_fences_is_malformed() {
        assert!(matches!(
            parse_llm_output(r#"{"solidity_code": "contract A {}", }"#),
            Err(GenerationFailure::Malformed(_))
        ));
    }

    #[test]
    fn empty_code_is_rejected() {
        assert_eq!(
            parse_llm_output(r#"{"solidity_code": "   ", "tests": "x"}"#),
            Err(GenerationFailure::EmptyCode)
        );
        assert_eq!(
            parse_llm_output("```solidity\n\n```"),
            Err(GenerationFailure::EmptyCode)
        );
    }
}
