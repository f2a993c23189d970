use {
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// A named, lifespan-bounded bag of parameters attached to a session.
///
/// Parameters are kept in a `BTreeMap` so the JSON form is stable and two
/// snapshots of the same context can be compared by their serialized text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Context {
    pub name: String,
    pub lifespan_count: i32,
    pub lifespan_time: f32,
    pub parameters: BTreeMap<String, ContextParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextParameter {
    pub display_name: String,
    pub value: String,
    pub value_original: String,
}

impl ContextParameter {
    /// Parameter whose display name is its key.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display_name: name.into(),
            value: value.into(),
            value_original: String::new(),
        }
    }
}

impl Context {
    pub fn new(name: impl Into<String>, lifespan_count: i32) -> Self {
        Self {
            name: name.into(),
            lifespan_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_lifespan_time(mut self, lifespan_time: f32) -> Self {
        self.lifespan_time = lifespan_time;
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.parameters
            .insert(name.clone(), ContextParameter::new(name, value));
        self
    }

    /// Contexts with a non-positive lifespan are expired and never written back.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.lifespan_count > 0
    }

    /// Deterministic JSON form used to detect local modifications.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Drop the audit fields the backend owns before pushing an update.
    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.created_by = None;
        self.created_at = None;
        self.modified_by = None;
        self.modified_at = None;
        self
    }

    /// Last path segment of the context name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        crate::names::last_segment(&self.name)
    }
}
