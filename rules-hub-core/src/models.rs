//! Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::CoreError;

/// A typed instruction produced by a matched rule, consumed by a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Type of the action, used for handler capability matching
    pub action_type: String,
    /// Generic value of the action
    pub value: Value,
}

impl Action {
    pub fn new(action_type: impl Into<String>, value: Value) -> Self {
        Self {
            action_type: action_type.into(),
            value,
        }
    }
}

/// Condition evaluated against a read-only snapshot of the rule's
/// referenced facts. Facts that never emitted are absent from the map.
pub type Condition = Box<dyn Fn(&HashMap<String, Value>) -> anyhow::Result<bool> + Send + Sync>;

/// A condition over facts plus the ordered actions to emit when it matches
///
/// Immutable once registered with the engine.
pub struct Rule {
    /// Unique identifier
    pub id: String,
    /// Evaluation priority; higher priorities contribute to a batch first
    pub priority: i32,
    /// Names of the facts the condition reads
    pub referenced_facts: HashSet<String>,
    /// Condition evaluated on each pass touching a referenced fact
    pub condition: Condition,
    /// Actions appended, in declared order, when the condition matches
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        referenced_facts: impl IntoIterator<Item = impl Into<String>>,
        condition: Condition,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            referenced_facts: referenced_facts.into_iter().map(Into::into).collect(),
            condition,
            actions,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("referenced_facts", &self.referenced_facts)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Typed specification of how to compute one template substitution value
///
/// Mirrors the CMS wire format: an object tagged by a `type` field. Tags
/// this version does not understand deserialize into [`Unknown`] and are
/// surfaced through `unknown_type_found` instead of failing the reply.
///
/// [`Unknown`]: VariableDescriptor::Unknown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VariableDescriptor {
    /// A constant value, substituted as-is
    Literal { value: Value },
    /// A relative asset path to run through the asset-path resolver
    RelativeUrl { value: String },
    /// The name of a fact whose first emission is snapshotted
    Fact { value: String },
    /// A localisation key plus the variable names of its fact parameters
    Localisation {
        /// Localisation key to translate
        value: String,
        /// Names of entries of the same variable map, each of `fact` type
        #[serde(default)]
        vars: Vec<String>,
    },
    /// Fallback for unrecognized wire tags
    #[serde(other)]
    Unknown,
}

/// A remote template plus the variables to substitute into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateReply {
    /// Placeholder name to descriptor map
    pub vars: HashMap<String, VariableDescriptor>,
    /// Template text containing `<%= name %>` markers
    pub template: String,
}

impl TemplateReply {
    /// Parse a reply from its CMS JSON representation
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check the localisation invariant: every `vars` entry of a
    /// `localisation` descriptor must name another entry of this map,
    /// and that entry must be of `fact` type.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, descriptor) in &self.vars {
            if let VariableDescriptor::Localisation { vars, .. } = descriptor {
                for param in vars {
                    match self.vars.get(param) {
                        Some(VariableDescriptor::Fact { .. }) => {}
                        Some(_) => {
                            return Err(CoreError::InvalidReply(format!(
                                "localisation '{name}' parameter '{param}' is not a fact variable"
                            )));
                        }
                        None => {
                            return Err(CoreError::InvalidReply(format!(
                                "localisation '{name}' references undefined variable '{param}'"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Result of resolving a template reply, before identity attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTemplate {
    /// Template with every resolved placeholder substituted
    pub rendered_template: String,
    /// Whether any descriptor carried an unrecognized type tag
    pub unknown_type_found: bool,
}

/// A rendered template published to the placeholder store, keyed by id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedEntity {
    /// Identity of the placeholder request
    pub id: String,
    /// Original template url of the trigger, if any
    pub url: Option<String>,
    /// Resolved template url of the trigger, if any
    pub resolved_url: Option<String>,
    /// Template with every resolved placeholder substituted
    pub rendered_template: String,
    /// Whether any descriptor carried an unrecognized type tag
    pub unknown_type_found: bool,
    /// When this entity was published
    pub resolved_at: DateTime<Utc>,
}

impl RenderedEntity {
    pub fn new(
        id: impl Into<String>,
        url: Option<String>,
        resolved_url: Option<String>,
        rendered: RenderedTemplate,
    ) -> Self {
        Self {
            id: id.into(),
            url,
            resolved_url,
            rendered_template: rendered.rendered_template,
            unknown_type_found: rendered.unknown_type_found,
            resolved_at: Utc::now(),
        }
    }
}
