//! Route descriptors
//!
//! The host never interprets routes; it hands them to whatever transport layer
//! sits on top.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP route exposed by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// Accepted methods, empty means any
    #[serde(default)]
    pub methods: Vec<String>,

    /// Path relative to the module mount point
    pub path: String,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RouteDescriptor {
    /// Create a route accepting any method
    pub fn any(path: impl Into<String>) -> Self {
        Self {
            methods: Vec::new(),
            path: path.into(),
            description: None,
        }
    }

    /// Create a GET route
    pub fn get(path: impl Into<String>) -> Self {
        Self::method("GET", path)
    }

    /// Create a POST route
    pub fn post(path: impl Into<String>) -> Self {
        Self::method("POST", path)
    }

    /// Create a route for a single method
    pub fn method(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            methods: vec![method.into()],
            path: path.into(),
            description: None,
        }
    }

    /// Attach a description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.methods.is_empty() {
            write!(f, "[*] {}", self.path)
        } else {
            write!(f, "[{}] {}", self.methods.join(", "), self.path)
        }
    }
}
