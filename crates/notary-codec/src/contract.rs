//! Function table of the document registry contract.

use crate::abi::ParamType;
use crate::call::FunctionSpec;

/// Output tuple shared by `getLatest` and `getVersion`.
pub const RECORD_TUPLE: &[ParamType] = &[
    ParamType::Uint,    // id
    ParamType::Bytes32, // docHash
    ParamType::String,  // ipfsCid
    ParamType::String,  // issuer
    ParamType::Uint,    // dateIssued
    ParamType::String,  // verifier
    ParamType::Address, // owner
    ParamType::Uint,    // version
    ParamType::Uint,    // createdAt
];

/// Names of the record tuple fields, in order.
pub const RECORD_FIELDS: [&str; 9] = [
    "id",
    "docHash",
    "ipfsCid",
    "issuer",
    "dateIssued",
    "verifier",
    "owner",
    "version",
    "createdAt",
];

pub const ADD_DOCUMENT: FunctionSpec = FunctionSpec {
    name: "addDocument",
    inputs: &[
        ParamType::Bytes32,
        ParamType::String,
        ParamType::String,
        ParamType::Uint,
        ParamType::String,
    ],
    outputs: &[],
    mutates: true,
};

pub const ADD_VERSION: FunctionSpec = FunctionSpec {
    name: "addVersion",
    inputs: &[
        ParamType::Uint,
        ParamType::Bytes32,
        ParamType::String,
        ParamType::String,
        ParamType::Uint,
        ParamType::String,
    ],
    outputs: &[],
    mutates: true,
};

pub const LOOKUP_BY_HASH: FunctionSpec = FunctionSpec {
    name: "lookupByHash",
    inputs: &[ParamType::Bytes32],
    outputs: &[ParamType::Uint],
    mutates: false,
};

pub const GET_LATEST: FunctionSpec = FunctionSpec {
    name: "getLatest",
    inputs: &[ParamType::Uint],
    outputs: RECORD_TUPLE,
    mutates: false,
};

pub const GET_VERSION: FunctionSpec = FunctionSpec {
    name: "getVersion",
    inputs: &[ParamType::Uint, ParamType::Uint],
    outputs: RECORD_TUPLE,
    mutates: false,
};

/// Every function the registry contract exposes.
pub const REGISTRY_FUNCTIONS: [FunctionSpec; 5] =
    [ADD_DOCUMENT, ADD_VERSION, LOOKUP_BY_HASH, GET_LATEST, GET_VERSION];

/// Functions a deployed ABI must declare for the registry to work against it.
pub const REQUIRED_FUNCTIONS: [&str; 4] =
    ["addDocument", "addVersion", "lookupByHash", "getLatest"];

const INPUT_NAMES: &[(&str, &[&str])] = &[
    (
        "addDocument",
        &["docHash", "ipfsCid", "issuer", "dateIssued", "verifier"],
    ),
    (
        "addVersion",
        &["id", "docHash", "ipfsCid", "issuer", "dateIssued", "verifier"],
    ),
    ("lookupByHash", &["docHash"]),
    ("getLatest", &["id"]),
    ("getVersion", &["id", "version"]),
];

/// JSON ABI of the registry contract, in the layout written to
/// `contract_abi.json` at deploy time.
pub fn abi_json() -> serde_json::Value {
    let entries: Vec<serde_json::Value> = REGISTRY_FUNCTIONS
        .iter()
        .map(|f| {
            let names = INPUT_NAMES
                .iter()
                .find(|(name, _)| *name == f.name)
                .map(|(_, names)| *names)
                .unwrap_or(&[]);
            let inputs: Vec<serde_json::Value> = f
                .inputs
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    serde_json::json!({
                        "name": names.get(i).copied().unwrap_or(""),
                        "type": ty.canonical_name(),
                    })
                })
                .collect();
            let outputs: Vec<serde_json::Value> = f
                .outputs
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    let name = if f.outputs.len() == RECORD_FIELDS.len() {
                        RECORD_FIELDS[i]
                    } else {
                        ""
                    };
                    serde_json::json!({ "name": name, "type": ty.canonical_name() })
                })
                .collect();
            serde_json::json!({
                "type": "function",
                "name": f.name,
                "inputs": inputs,
                "outputs": outputs,
                "stateMutability": if f.mutates { "nonpayable" } else { "view" },
            })
        })
        .collect();
    serde_json::Value::Array(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn selectors_are_unique() {
        let selectors: HashSet<[u8; 4]> =
            REGISTRY_FUNCTIONS.iter().map(FunctionSpec::selector).collect();
        assert_eq!(selectors.len(), REGISTRY_FUNCTIONS.len());
    }

    #[test]
    fn abi_declares_required_functions() {
        let abi = abi_json();
        let names: Vec<&str> = abi
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        for required in REQUIRED_FUNCTIONS {
            assert!(names.contains(&required), "missing {required}");
        }
    }

    #[test]
    fn abi_names_inputs_and_outputs() {
        let abi = abi_json();
        let add = abi
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["name"] == "addDocument")
            .unwrap();
        assert_eq!(add["inputs"][0]["name"], "docHash");
        assert_eq!(add["inputs"][0]["type"], "bytes32");
        assert_eq!(add["stateMutability"], "nonpayable");

        let latest = abi
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["name"] == "getLatest")
            .unwrap();
        assert_eq!(latest["outputs"][6]["name"], "owner");
        assert_eq!(latest["outputs"][6]["type"], "address");
        assert_eq!(latest["stateMutability"], "view");
    }
}
