//! Conversions between resource state (JSON) and node values.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde_json::{json, Map, Value};

use crate::error::ProviderError;
use crate::node::{Acl, ZNode};
use crate::validation::as_int64;

/// The attributes every node-backed state carries.
pub(crate) fn znode_state(node: &ZNode) -> Result<Map<String, Value>, ProviderError> {
    let mut state = Map::new();
    state.insert("path".to_string(), Value::String(node.path.clone()));
    state.insert(
        "data".to_string(),
        Value::String(String::from_utf8_lossy(&node.data).into_owned()),
    );
    state.insert(
        "data_base64".to_string(),
        Value::String(BASE64_STANDARD.encode(&node.data)),
    );
    state.insert("acl".to_string(), acl_value(&node.acl));
    state.insert("stat".to_string(), serde_json::to_value(node.stat)?);
    Ok(state)
}

fn acl_value(acl: &[Acl]) -> Value {
    Value::Array(
        acl.iter()
            .map(|entry| {
                json!({
                    "scheme": entry.scheme,
                    "id": entry.id,
                    "permissions": entry.permissions,
                })
            })
            .collect(),
    )
}

/// Parse the `acl` attribute. Unset or empty yields an empty list, which the
/// node client replaces with the open default.
pub(crate) fn parse_acl(state: &Value) -> Result<Vec<Acl>, ProviderError> {
    let entries = match state.get("acl") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(ProviderError::Validation("'acl' must be a list".to_string())),
    };

    entries
        .iter()
        .map(|entry| -> Result<Acl, ProviderError> {
            let scheme = acl_field(entry, "scheme")?;
            let id = acl_field(entry, "id")?;
            let permissions = entry
                .get("permissions")
                .and_then(as_int64)
                .ok_or_else(|| {
                    ProviderError::Validation("acl permissions value is not an integer".to_string())
                })?;
            let permissions = i32::try_from(permissions).map_err(|_| {
                ProviderError::Validation(format!(
                    "ACL permissions value {} is out of int32 range",
                    permissions
                ))
            })?;
            Ok(Acl::new(scheme, id, permissions))
        })
        .collect()
}

fn acl_field<'a>(entry: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    entry
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation(format!("acl entry is missing '{}'", name)))
}

fn non_empty_str<'a>(state: &'a Value, name: &str) -> Option<&'a str> {
    state.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, ProviderError> {
    BASE64_STANDARD.decode(encoded).map_err(|e| {
        ProviderError::Validation(format!("decoding 'data_base64' from Base64 failed: {}", e))
    })
}

/// The payload of a new node: `data` if set, else decoded `data_base64`,
/// else nothing.
pub(crate) fn data_for_create(state: &Value) -> Result<Vec<u8>, ProviderError> {
    if let Some(data) = non_empty_str(state, "data") {
        return Ok(data.as_bytes().to_vec());
    }
    match non_empty_str(state, "data_base64") {
        Some(encoded) => decode_base64(encoded),
        None => Ok(Vec::new()),
    }
}

/// The payload for an update.
///
/// Both encodings are stored in state, so the one that differs from the
/// prior state is the one that was edited.
pub(crate) fn data_for_update(prior: &Value, planned: &Value) -> Result<Vec<u8>, ProviderError> {
    let data_changed = prior.get("data") != planned.get("data");
    let base64_changed = prior.get("data_base64") != planned.get("data_base64");
    if base64_changed && !data_changed {
        return match non_empty_str(planned, "data_base64") {
            Some(encoded) => decode_base64(encoded),
            None => Ok(Vec::new()),
        };
    }
    Ok(non_empty_str(planned, "data")
        .map(|data| data.as_bytes().to_vec())
        .unwrap_or_default())
}

/// Whether any attribute written to the node differs between the states.
pub(crate) fn node_changed(prior: &Value, planned: &Value) -> bool {
    ["data", "data_base64", "acl"]
        .iter()
        .any(|name| prior.get(name) != planned.get(name))
}

/// A required string attribute.
pub(crate) fn required_str<'a>(state: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    non_empty_str(state, name)
        .ok_or_else(|| ProviderError::Validation(format!("'{}' is required", name)))
}
