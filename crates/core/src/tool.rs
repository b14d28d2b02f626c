//! Tool definitions offered to the model

use compact_str::CompactString;
use schemars::Schema;
use serde::{Deserialize, Serialize};

/// A tool activity the model may call.
///
/// A tool groups several activities under one name; each activity is one
/// callable function on the wire, addressed as `{name}_{path}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolSpec {
    /// The name of the tool
    pub name: CompactString,

    /// The activity within the tool
    #[serde(default)]
    pub path: CompactString,

    /// The description of the activity
    pub description: String,

    /// JSON schema of the activity input
    pub parameters: Schema,
}

impl ToolSpec {
    /// Create a new tool spec.
    pub fn new(
        name: impl Into<CompactString>,
        path: impl Into<CompactString>,
        description: impl Into<String>,
        parameters: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            description: description.into(),
            parameters,
        }
    }

    /// The function name sent to vendors.
    pub fn wire_name(&self) -> String {
        wire_name(&self.name, &self.path)
    }

    /// Resolve a wire name back into `(name, path)`.
    ///
    /// Known specs are matched first; otherwise the name is split on the
    /// first `_`.
    pub fn find(specs: &[ToolSpec], wire_name: &str) -> (CompactString, CompactString) {
        if let Some(spec) = specs.iter().find(|s| s.wire_name() == wire_name) {
            return (spec.name.clone(), spec.path.clone());
        }

        match wire_name.split_once('_') {
            Some((name, path)) => (name.into(), path.into()),
            None => (wire_name.into(), CompactString::default()),
        }
    }
}

/// `{name}_{path}`, or just `name` for a path-less tool.
pub(crate) fn wire_name(name: &str, path: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{name}_{path}")
    }
}
