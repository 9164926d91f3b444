//! Deployment plan document and its validated in-memory form.
//!
//! A plan is a TOML document listing contract deployment steps in order:
//!
//! ```toml
//! [[step]]
//! id = "token"
//! artifact = "Token"
//!
//! [[step]]
//! id = "vault"
//! artifact = "Vault"
//! args = ["${token}.address", 100]
//! ```
//!
//! A string argument of the form `${stepId}.address` is a reference to the
//! deployed address of an earlier step; every other argument is a literal
//! coerced against the artifact's constructor schema at encode time. A step
//! may also carry a `network` key overriding the session's target network
//! for its records.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::PlanError;
use crate::graph;

/// The default name for a plan document.
pub const PLAN_FILENAME: &str = "Plan.toml";

/// A single constructor argument, either a literal value or a reference to a
/// prior step's deployed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorArg {
    /// Literal value in textual form. Coerced against the constructor's
    /// declared parameter type when the payload is built.
    Literal(String),
    /// Reference to the deployed address of the named step.
    Reference { step: String },
}

/// One contract deployment unit within a plan. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStep {
    /// Unique identifier of the step within the plan.
    pub id: String,
    /// Name of the compiled artifact to deploy.
    pub artifact: String,
    /// Constructor arguments, literal or reference.
    pub args: Vec<ConstructorArg>,
    /// Target network override; records of this step are keyed under it
    /// instead of the session network.
    pub network: Option<String>,
}

impl DeploymentStep {
    /// Iterate over the step ids this step references.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Reference { step } => Some(step.as_str()),
            ConstructorArg::Literal(_) => None,
        })
    }
}

/// Raw plan document as deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
struct PlanDoc {
    #[serde(default, rename = "step")]
    steps: Vec<StepDoc>,
}

#[derive(Debug, Clone, Deserialize)]
struct StepDoc {
    id: String,
    artifact: String,
    #[serde(default)]
    args: Vec<toml::Value>,
    #[serde(default)]
    network: Option<String>,
}

/// A validated deployment plan.
///
/// Invariants, enforced at construction: step ids are unique, every reference
/// resolves to an earlier step, and the dependency graph is acyclic. The step
/// sequence is therefore already in topological order.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
    /// Per-step indices of prerequisite steps, aligned with `steps`.
    deps: Vec<Vec<usize>>,
}

impl DeploymentPlan {
    /// Validate a sequence of steps into a plan.
    pub fn build(steps: Vec<DeploymentStep>) -> Result<Self, PlanError> {
        let index = graph::validate(&steps)?;
        let deps = graph::dependency_indices(&steps, &index);
        Ok(Self { steps, deps })
    }

    /// Parse and validate a plan from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, PlanError> {
        let doc: PlanDoc = toml::from_str(content).map_err(|e| PlanError::Parse(e.to_string()))?;

        let steps = doc
            .steps
            .into_iter()
            .map(|raw| {
                let args = raw
                    .args
                    .iter()
                    .map(|value| parse_arg(&raw.id, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DeploymentStep {
                    id: raw.id,
                    artifact: raw.artifact,
                    args,
                    network: raw.network,
                })
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Self::build(steps)
    }

    /// Load and validate a plan from a TOML file.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The steps in topological order.
    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    /// Indices of the prerequisite steps of step `i`.
    pub fn dependencies_of(&self, i: usize) -> &[usize] {
        &self.deps[i]
    }

    /// Position of a step id within the topological order.
    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parse one TOML argument value into a [`ConstructorArg`].
fn parse_arg(step_id: &str, value: &toml::Value) -> Result<ConstructorArg, PlanError> {
    match value {
        toml::Value::String(s) => {
            if let Some(rest) = s.strip_prefix("${") {
                let Some((target, suffix)) = rest.split_once('}') else {
                    return Err(PlanError::InvalidReference {
                        step: step_id.to_string(),
                        raw: s.clone(),
                    });
                };
                if suffix != ".address" || target.is_empty() {
                    return Err(PlanError::InvalidReference {
                        step: step_id.to_string(),
                        raw: s.clone(),
                    });
                }
                Ok(ConstructorArg::Reference {
                    step: target.to_string(),
                })
            } else {
                Ok(ConstructorArg::Literal(s.clone()))
            }
        }
        toml::Value::Integer(i) => Ok(ConstructorArg::Literal(i.to_string())),
        toml::Value::Boolean(b) => Ok(ConstructorArg::Literal(b.to_string())),
        other => Err(PlanError::Parse(format!(
            "step `{}`: unsupported argument type `{}`",
            step_id,
            other.type_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_VAULT_PLAN: &str = r#"
        [[step]]
        id = "token"
        artifact = "Token"

        [[step]]
        id = "vault"
        artifact = "Vault"
        args = ["${token}.address", 100, true]
    "#;

    #[test]
    fn test_parse_token_vault_plan() {
        let plan = DeploymentPlan::from_toml_str(TOKEN_VAULT_PLAN).expect("plan should parse");
        assert_eq!(plan.len(), 2);

        let vault = &plan.steps()[1];
        assert_eq!(vault.id, "vault");
        assert_eq!(vault.artifact, "Vault");
        assert_eq!(
            vault.args,
            vec![
                ConstructorArg::Reference {
                    step: "token".to_string()
                },
                ConstructorArg::Literal("100".to_string()),
                ConstructorArg::Literal("true".to_string()),
            ]
        );
    }

    #[test]
    fn test_dependencies_iterator() {
        let plan = DeploymentPlan::from_toml_str(TOKEN_VAULT_PLAN).expect("plan should parse");
        let deps: Vec<&str> = plan.steps()[1].dependencies().collect();
        assert_eq!(deps, vec!["token"]);
        assert_eq!(plan.dependencies_of(1), &[0]);
        assert!(plan.dependencies_of(0).is_empty());
    }

    #[test]
    fn test_plain_string_is_literal() {
        let plan = DeploymentPlan::from_toml_str(
            r#"
            [[step]]
            id = "token"
            artifact = "Token"
            args = ["0x000000000000000000000000000000000000dEaD"]
            "#,
        )
        .expect("plan should parse");

        assert_eq!(
            plan.steps()[0].args[0],
            ConstructorArg::Literal("0x000000000000000000000000000000000000dEaD".to_string())
        );
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let result = DeploymentPlan::from_toml_str(
            r#"
            [[step]]
            id = "vault"
            artifact = "Vault"
            args = ["${token.address"]
            "#,
        );
        assert!(matches!(result, Err(PlanError::InvalidReference { .. })));
    }

    #[test]
    fn test_reference_without_address_suffix_rejected() {
        let result = DeploymentPlan::from_toml_str(
            r#"
            [[step]]
            id = "vault"
            artifact = "Vault"
            args = ["${token}.balance"]
            "#,
        );
        assert!(matches!(result, Err(PlanError::InvalidReference { .. })));
    }

    #[test]
    fn test_float_argument_rejected() {
        let result = DeploymentPlan::from_toml_str(
            r#"
            [[step]]
            id = "token"
            artifact = "Token"
            args = [1.5]
            "#,
        );
        assert!(matches!(result, Err(PlanError::Parse(_))));
    }

    #[test]
    fn test_network_override_parsed() {
        let plan = DeploymentPlan::from_toml_str(
            r#"
            [[step]]
            id = "token"
            artifact = "Token"
            network = "sidechain"
            "#,
        )
        .expect("plan should parse");
        assert_eq!(plan.steps()[0].network.as_deref(), Some("sidechain"));
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let plan = DeploymentPlan::from_toml_str("").expect("empty plan should parse");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = DeploymentPlan::from_toml_str("[[step]\nid=");
        assert!(matches!(result, Err(PlanError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = DeploymentPlan::load(Path::new("/nonexistent/Plan.toml"));
        assert!(matches!(result, Err(PlanError::Read { .. })));
    }
}
