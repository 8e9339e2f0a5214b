//! Caller snapshot handed to background work.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::id::SessionId;

/// Who made the request, as known at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub session: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CallerIdentity {
    pub fn anonymous(session: SessionId) -> Self {
        Self {
            session,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Point-in-time snapshot of an invocation.
///
/// The originating request is gone by the time the work runs; handlers only
/// ever see this value. It is plain serializable data so it can cross a
/// process boundary to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Name of the registered handler that runs this work.
    pub handler: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Form or JSON body parameters.
    #[serde(default)]
    pub form: Map<String, JsonValue>,
    /// Parameters bound by the matched route.
    #[serde(default)]
    pub route_params: BTreeMap<String, String>,
    pub identity: CallerIdentity,
    pub captured_at: DateTime<Utc>,
}

impl CallerContext {
    pub fn new(
        handler: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        identity: CallerIdentity,
    ) -> Self {
        Self {
            handler: handler.into(),
            method: method.into(),
            path: path.into(),
            query: BTreeMap::new(),
            form: Map::new(),
            route_params: BTreeMap::new(),
            identity,
            captured_at: Utc::now(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_form(mut self, form: Map<String, JsonValue>) -> Self {
        self.form = form;
        self
    }

    pub fn with_form_value(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.form.insert(name.into(), value);
        self
    }

    pub fn with_route_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn form_value(&self, name: &str) -> Option<&JsonValue> {
        self.form.get(name)
    }

    pub fn session(&self) -> &SessionId {
        &self.identity.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_serialization() {
        let identity = CallerIdentity::anonymous(SessionId::new("42").unwrap()).with_user("alice");
        let ctx = CallerContext::new("report", "POST", "/work/report", identity)
            .with_query("year", "2026")
            .with_form_value("format", serde_json::json!("pdf"))
            .with_route_param("handler", "report");

        let json = serde_json::to_value(&ctx).unwrap();
        let back: CallerContext = serde_json::from_value(json).unwrap();

        assert_eq!(back, ctx);
        assert_eq!(back.query_param("year"), Some("2026"));
        assert_eq!(back.form_value("format"), Some(&serde_json::json!("pdf")));
        assert_eq!(back.identity.user_id.as_deref(), Some("alice"));
    }
}
