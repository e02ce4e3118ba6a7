use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::resource::ResourceType;
use crate::time::{SyncTimestamp, now_utc};

/// Why a resource fetch did not produce a usable body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceErrorKind {
    /// The API answered with a non-2xx status.
    Status,
    /// The request never completed (connect, timeout, TLS, ...).
    Transport,
    /// 2xx with nothing in the body.
    EmptyBody,
    /// 2xx with a body that is not a JSON object.
    Decode,
}

/// Identity of one fetch: what was asked, from which server, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMeta {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub server_name: String,
    pub timestamp: SyncTimestamp,
}

impl ResourceMeta {
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            server_name: server_name.into(),
            timestamp: now_utc(),
        }
    }
}

/// Outcome of a single resource fetch. The gateway never fails past this type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceResult {
    Success {
        meta: ResourceMeta,
        body: Map<String, Value>,
    },
    Error {
        meta: ResourceMeta,
        kind: ResourceErrorKind,
        message: String,
    },
}

impl ResourceResult {
    pub fn success(meta: ResourceMeta, body: Map<String, Value>) -> Self {
        Self::Success { meta, body }
    }

    pub fn error(meta: ResourceMeta, kind: ResourceErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            meta,
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn meta(&self) -> &ResourceMeta {
        match self {
            Self::Success { meta, .. } | Self::Error { meta, .. } => meta,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }

    pub fn error_kind(&self) -> Option<ResourceErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// Flat JSON map as exposed over HTTP. On success the remote body is
    /// returned with the bookkeeping keys layered on top of it.
    pub fn to_json(&self) -> Value {
        let mut map = match self {
            Self::Success { body, .. } => body.clone(),
            Self::Error { message, .. } => {
                let mut map = Map::new();
                map.insert("message".into(), Value::String(message.clone()));
                map
            }
        };
        let meta = self.meta();
        map.insert(
            "resourceType".into(),
            Value::String(meta.resource_type.as_str().to_string()),
        );
        map.insert("resourceId".into(), Value::String(meta.resource_id.clone()));
        map.insert("serverName".into(), Value::String(meta.server_name.clone()));
        map.insert("status".into(), Value::String(self.status().to_string()));
        map.insert("timestamp".into(), Value::String(meta.timestamp.to_string()));
        Value::Object(map)
    }
}

impl Serialize for ResourceResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
