//! Raw chain object types at the RPC boundary.
//!
//! These mirror what the object read surface hands back: an object id, an
//! optional Move type string, an owner, and a loosely-typed JSON field bag.
//! Nothing outside the mapper should look inside [`RawObject::fields`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to an on-chain object (hex string, e.g. `0x6`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Creates an object id from its string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the all-zero placeholder (`0x0`) used for unset config.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        let hex = self.0.trim_start_matches("0x");
        hex.is_empty() || hex.chars().all(|c| c == '0')
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An account address (wallet or derived login address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an address from its string representation.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the string form of this address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Digest of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDigest(String);

impl TransactionDigest {
    /// Creates a digest from its base58 string form.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Returns the string form of this digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ownership of an on-chain object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    /// Owned by a single account.
    AddressOwner(Address),
    /// Owned by another object (dynamic field child).
    ObjectOwner(ObjectId),
    /// Shared object, accessible to everyone.
    Shared {
        /// Version at which the object became shared.
        initial_shared_version: u64,
    },
    /// Frozen object.
    Immutable,
}

impl Owner {
    /// Returns the owning address for address-owned objects.
    #[must_use]
    pub const fn address(&self) -> Option<&Address> {
        match self {
            Self::AddressOwner(addr) => Some(addr),
            _ => None,
        }
    }
}

/// An object as returned by the read surface, before mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    /// The object's id.
    pub object_id: ObjectId,
    /// Full Move struct type, if the read requested it.
    pub object_type: Option<String>,
    /// Owner of the object.
    pub owner: Option<Owner>,
    /// Digest of the last transaction that touched this object.
    pub previous_transaction: Option<TransactionDigest>,
    /// The Move struct fields. `None` when the object has no readable content.
    pub fields: Option<Value>,
}

impl RawObject {
    /// Creates a raw object with content and no provenance metadata.
    #[must_use]
    pub const fn with_fields(object_id: ObjectId, fields: Value) -> Self {
        Self {
            object_id,
            object_type: None,
            owner: None,
            previous_transaction: None,
            fields: Some(fields),
        }
    }

    /// Returns a named field from the field bag, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref()?.get(name)
    }
}

/// Key of a dynamic field: a Move type plus a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicFieldName {
    /// Move type of the key (e.g. `address` or `<pkg>::kanban::TaskKey`).
    #[serde(rename = "type")]
    pub type_: String,
    /// The key value.
    pub value: Value,
}

impl DynamicFieldName {
    /// Key for a table keyed by account address.
    #[must_use]
    pub fn address(addr: &Address) -> Self {
        Self {
            type_: "address".to_string(),
            value: Value::String(addr.as_str().to_string()),
        }
    }
}

/// One entry of a dynamic field enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicFieldInfo {
    /// The field's key.
    pub name: DynamicFieldName,
    /// Id of the field object itself.
    pub object_id: ObjectId,
    /// Move type of the stored value, when reported.
    pub object_type: Option<String>,
}

/// An object change reported in a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectChange {
    /// A new object was created.
    Created {
        /// Id of the new object.
        object_id: ObjectId,
        /// Its Move type.
        object_type: String,
    },
    /// An existing object was mutated.
    Mutated {
        /// Id of the mutated object.
        object_id: ObjectId,
        /// Its Move type.
        object_type: String,
    },
    /// An object was deleted.
    Deleted {
        /// Id of the deleted object.
        object_id: ObjectId,
    },
}

impl ObjectChange {
    /// The id of the object this change refers to.
    #[must_use]
    pub const fn object_id(&self) -> &ObjectId {
        match self {
            Self::Created { object_id, .. }
            | Self::Mutated { object_id, .. }
            | Self::Deleted { object_id } => object_id,
        }
    }
}

/// Receipt of a transaction that reached finality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// The transaction digest.
    pub digest: TransactionDigest,
    /// Objects created, mutated or deleted by the transaction.
    pub object_changes: Vec<ObjectChange>,
}

impl TransactionReceipt {
    /// Returns the first created object whose type ends with `suffix`.
    #[must_use]
    pub fn created_with_type_suffix(&self, suffix: &str) -> Option<&ObjectId> {
        self.object_changes.iter().find_map(|change| match change {
            ObjectChange::Created {
                object_id,
                object_type,
            } if object_type.ends_with(suffix) => Some(object_id),
            _ => None,
        })
    }
}
