//! JSON-RPC chain client.
//!
//! Implements [`ChainReader`] over HTTP against a full node's JSON-RPC
//! endpoint, plus a polling finality wait for transactions that were signed
//! and submitted elsewhere (by the wallet).
//!
//! Response decoding is kept in free functions so it can be tested without a
//! node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use url::Url;

use toad_proto::object::{
    Address, DynamicFieldInfo, DynamicFieldName, ObjectChange, ObjectId, Owner, RawObject,
    TransactionDigest, TransactionReceipt,
};

use super::{ChainError, ChainReader};

/// Page size requested from paginated endpoints.
const PAGE_LIMIT: u64 = 50;

/// Upper bound on pages followed for one enumeration.
const MAX_PAGES: usize = 100;

/// Delay between finality polls.
const FINALITY_POLL: Duration = Duration::from_millis(500);

/// HTTP JSON-RPC client for the object read surface.
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: Url,
    finality_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Creates a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        request_timeout: Duration,
        finality_timeout: Duration,
    ) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            finality_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// The node endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        tracing::debug!(method, id, "rpc request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(method, err = %e, "rpc request failed");
                ChainError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(method, %status, "rpc returned http error");
            return Err(ChainError::Transport(format!("http status {status}")));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Malformed(e.to_string()))?;
        unwrap_envelope(envelope)
    }

    /// Poll until `digest` is known to the node, then return its receipt.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Timeout`] if the transaction is not visible
    /// within the finality timeout, or the error of a failed poll that is not
    /// "not found yet".
    pub async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionReceipt, ChainError> {
        let deadline = tokio::time::Instant::now() + self.finality_timeout;
        loop {
            let params = json!([digest.as_str(), transaction_options()]);
            match self.call("sui_getTransactionBlock", params).await {
                Ok(result) => return parse_transaction(&result),
                Err(ChainError::Rpc(msg)) => {
                    tracing::debug!(%digest, %msg, "transaction not yet visible");
                }
                Err(e) => return Err(e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::Timeout(self.finality_timeout));
            }
            tokio::time::sleep(FINALITY_POLL).await;
        }
    }
}

fn object_options() -> Value {
    json!({
        "showContent": true,
        "showType": true,
        "showOwner": true,
        "showPreviousTransaction": true,
    })
}

// Effects carry the execution status.
fn transaction_options() -> Value {
    json!({
        "showEffects": true,
        "showObjectChanges": true,
    })
}

impl ChainReader for RpcClient {
    async fn get_object(&self, id: &ObjectId) -> Result<RawObject, ChainError> {
        let result = self
            .call("sui_getObject", json!([id.as_str(), object_options()]))
            .await?;
        parse_object_response(id, &result)
    }

    async fn get_dynamic_fields(&self, parent: &ObjectId) -> Result<Vec<DynamicFieldInfo>, ChainError> {
        let mut fields = Vec::new();
        let mut cursor = Value::Null;
        for _ in 0..MAX_PAGES {
            let page = self
                .call(
                    "suix_getDynamicFields",
                    json!([parent.as_str(), cursor, PAGE_LIMIT]),
                )
                .await?;
            let (mut entries, next) = parse_dynamic_field_page(&page)?;
            fields.append(&mut entries);
            match next {
                Some(next) => cursor = next,
                None => return Ok(fields),
            }
        }
        tracing::warn!(%parent, "dynamic field enumeration truncated");
        Ok(fields)
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<RawObject, ChainError> {
        let name = serde_json::to_value(name).map_err(|e| ChainError::Malformed(e.to_string()))?;
        let result = self
            .call("suix_getDynamicFieldObject", json!([parent.as_str(), name]))
            .await?;
        parse_object_response(parent, &result)
    }

    async fn get_owned_objects(
        &self,
        owner: &Address,
        struct_type: &str,
    ) -> Result<Vec<RawObject>, ChainError> {
        let query = json!({
            "filter": { "StructType": struct_type },
            "options": object_options(),
        });
        let mut objects = Vec::new();
        let mut cursor = Value::Null;
        for _ in 0..MAX_PAGES {
            let page = self
                .call(
                    "suix_getOwnedObjects",
                    json!([owner.as_str(), query, cursor, PAGE_LIMIT]),
                )
                .await?;
            let data = page
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| ChainError::Malformed("owned objects page without data".into()))?;
            for entry in data {
                match entry.get("data").map(parse_object_data) {
                    Some(Ok(object)) => objects.push(object),
                    Some(Err(e)) => tracing::warn!(%owner, err = %e, "skipping owned object"),
                    None => {}
                }
            }
            match next_cursor(&page) {
                Some(next) => cursor = next,
                None => return Ok(objects),
            }
        }
        tracing::warn!(%owner, "owned object enumeration truncated");
        Ok(objects)
    }
}

/// Extract `result` from a JSON-RPC envelope.
fn unwrap_envelope(mut envelope: Value) -> Result<Value, ChainError> {
    if let Some(error) = envelope.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown rpc error");
        return Err(ChainError::Rpc(message.to_string()));
    }
    envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ChainError::Malformed("response has neither result nor error".into()))
}

/// Decode a `sui_getObject`-shaped result (`{data}` or `{error}`).
fn parse_object_response(id: &ObjectId, result: &Value) -> Result<RawObject, ChainError> {
    if let Some(error) = result.get("error") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
        return match code {
            "notExists" | "deleted" | "dynamicFieldNotFound" => Err(ChainError::NotFound(id.clone())),
            _ => Err(ChainError::Rpc(error.to_string())),
        };
    }
    let data = result
        .get("data")
        .ok_or_else(|| ChainError::Malformed(format!("object {id} without data")))?;
    parse_object_data(data)
}

fn parse_object_data(data: &Value) -> Result<RawObject, ChainError> {
    let object_id = data
        .get("objectId")
        .and_then(Value::as_str)
        .map(ObjectId::new)
        .ok_or_else(|| ChainError::Malformed("object data without objectId".into()))?;
    let object_type = data.get("type").and_then(Value::as_str).map(str::to_string);
    let owner = data
        .get("owner")
        .and_then(|o| serde_json::from_value::<Owner>(o.clone()).ok());
    let previous_transaction = data
        .get("previousTransaction")
        .and_then(Value::as_str)
        .map(TransactionDigest::new);
    // Only Move objects carry a field bag; packages have none.
    let fields = data
        .get("content")
        .filter(|c| c.get("dataType").and_then(Value::as_str) == Some("moveObject"))
        .and_then(|c| c.get("fields"))
        .cloned();

    Ok(RawObject {
        object_id,
        object_type,
        owner,
        previous_transaction,
        fields,
    })
}

fn next_cursor(page: &Value) -> Option<Value> {
    let more = page.get("hasNextPage").and_then(Value::as_bool).unwrap_or(false);
    let cursor = page.get("nextCursor").filter(|c| !c.is_null())?;
    more.then(|| cursor.clone())
}

fn parse_dynamic_field_page(page: &Value) -> Result<(Vec<DynamicFieldInfo>, Option<Value>), ChainError> {
    let data = page
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::Malformed("dynamic field page without data".into()))?;
    let mut entries = Vec::with_capacity(data.len());
    for entry in data {
        let Some(name) = entry
            .get("name")
            .and_then(|n| serde_json::from_value::<DynamicFieldName>(n.clone()).ok())
        else {
            tracing::warn!("skipping dynamic field with unreadable name");
            continue;
        };
        let Some(object_id) = entry.get("objectId").and_then(Value::as_str) else {
            continue;
        };
        entries.push(DynamicFieldInfo {
            name,
            object_id: ObjectId::new(object_id),
            object_type: entry
                .get("objectType")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    Ok((entries, next_cursor(page)))
}

fn parse_transaction(result: &Value) -> Result<TransactionReceipt, ChainError> {
    let digest = result
        .get("digest")
        .and_then(Value::as_str)
        .map(TransactionDigest::new)
        .ok_or_else(|| ChainError::Malformed("transaction without digest".into()))?;

    if let Some(status) = result.pointer("/effects/status/status").and_then(Value::as_str)
        && status != "success"
    {
        let reason = result
            .pointer("/effects/status/error")
            .and_then(Value::as_str)
            .unwrap_or(status);
        return Err(ChainError::Execution(reason.to_string()));
    }

    let object_changes = result
        .get("objectChanges")
        .and_then(Value::as_array)
        .map(|changes| changes.iter().filter_map(parse_object_change).collect())
        .unwrap_or_default();

    Ok(TransactionReceipt {
        digest,
        object_changes,
    })
}

fn parse_object_change(change: &Value) -> Option<ObjectChange> {
    let object_id = ObjectId::new(change.get("objectId")?.as_str()?);
    let object_type = change
        .get("objectType")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match change.get("type")?.as_str()? {
        "created" => Some(ObjectChange::Created {
            object_id,
            object_type,
        }),
        "mutated" => Some(ObjectChange::Mutated {
            object_id,
            object_type,
        }),
        "deleted" | "wrapped" => Some(ObjectChange::Deleted { object_id }),
        _ => None,
    }
}
