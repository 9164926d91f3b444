//! Compiled contract artifact lookup and constructor encoding.
//!
//! Artifacts are compiler-output JSON files (`contractName`, `abi`,
//! `bytecode`) stored under a single directory and addressed by contract
//! name. The store is a pure lookup; artifacts are immutable once loaded.

use std::path::{Path, PathBuf};

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_core::primitives::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::error::DeployError;

/// Constructor encoding failure. Wrapped by [`DeployError::Constructor`] with
/// the offending step id attached.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("constructor takes {expected} argument(s), plan provides {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("unsupported constructor parameter type `{ty}`: {reason}")]
    BadType { ty: String, reason: String },

    #[error("cannot coerce `{value}` to `{ty}`: {reason}")]
    BadValue {
        value: String,
        ty: String,
        reason: String,
    },
}

/// On-disk artifact shape produced by contract compilers.
#[derive(Debug, Deserialize)]
struct ArtifactFile {
    #[serde(rename = "contractName")]
    contract_name: Option<String>,
    abi: Vec<serde_json::Value>,
    bytecode: String,
}

/// A compiled contract: interface descriptor, creation bytecode, and the
/// constructor parameter schema extracted from the ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: Vec<serde_json::Value>,
    pub bytecode: Bytes,
    constructor_types: Vec<String>,
}

impl ContractArtifact {
    /// Solidity type strings of the constructor parameters, in order.
    pub fn constructor_types(&self) -> &[String] {
        &self.constructor_types
    }

    /// ABI-encode textual constructor arguments against the schema and append
    /// them to the creation bytecode, producing the deployment payload data.
    pub fn encode_constructor(&self, args: &[String]) -> Result<Bytes, EncodeError> {
        if self.constructor_types.len() != args.len() {
            return Err(EncodeError::ArityMismatch {
                expected: self.constructor_types.len(),
                got: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for (ty_str, raw) in self.constructor_types.iter().zip(args) {
            let ty: DynSolType = ty_str.parse().map_err(|e| EncodeError::BadType {
                ty: ty_str.clone(),
                reason: format!("{e}"),
            })?;
            let value = ty.coerce_str(raw).map_err(|e| EncodeError::BadValue {
                value: raw.clone(),
                ty: ty_str.clone(),
                reason: format!("{e}"),
            })?;
            values.push(value);
        }

        let encoded = DynSolValue::Tuple(values).abi_encode_params();
        let mut data = self.bytecode.to_vec();
        data.extend_from_slice(&encoded);
        Ok(Bytes::from(data))
    }
}

/// Loads compiled contract artifacts by name from a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the artifact for `name` from `<dir>/<name>.json`.
    pub fn load(&self, name: &str) -> Result<ContractArtifact, DeployError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(DeployError::ArtifactNotFound {
                name: name.to_string(),
                dir: self.dir.clone(),
            });
        }

        let content =
            std::fs::read_to_string(&path).map_err(|e| DeployError::ArtifactMalformed {
                name: name.to_string(),
                reason: format!("failed to read {}: {e}", path.display()),
            })?;

        let file: ArtifactFile =
            serde_json::from_str(&content).map_err(|e| DeployError::ArtifactMalformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let bytecode: Bytes =
            file.bytecode
                .parse()
                .map_err(|e| DeployError::ArtifactMalformed {
                    name: name.to_string(),
                    reason: format!("invalid bytecode hex: {e}"),
                })?;

        Ok(ContractArtifact {
            name: file.contract_name.unwrap_or_else(|| name.to_string()),
            constructor_types: constructor_types_from_abi(&file.abi),
            abi: file.abi,
            bytecode,
        })
    }
}

/// Extract constructor parameter types from an ABI. A missing constructor
/// entry means a parameterless constructor.
fn constructor_types_from_abi(abi: &[serde_json::Value]) -> Vec<String> {
    abi.iter()
        .find(|entry| entry.get("type").and_then(|t| t.as_str()) == Some("constructor"))
        .and_then(|ctor| ctor.get("inputs"))
        .and_then(|inputs| inputs.as_array())
        .map(|inputs| {
            inputs
                .iter()
                .filter_map(|input| input.get("type").and_then(|t| t.as_str()))
                .map(|t| t.to_string())
                .collect()
        })
        .unwrap_or_default()
}
