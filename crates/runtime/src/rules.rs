//! Rules steering the model, rendered into the system prompt.

use serde::{Deserialize, Serialize};

/// A single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule {
    /// The instruction text.
    pub value: String,
}

impl Rule {
    /// Create a rule.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A named group of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Ruleset name.
    pub name: String,
    /// The rules, in order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Ruleset {
    /// Create a ruleset.
    pub fn new(name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            name: name.into(),
            rules: rules.into_iter().collect(),
        }
    }
}

const RULESETS_TEMPLATE: &str = r#"{% for ruleset in rulesets %}Ruleset name: {{ ruleset.name }}
"{{ ruleset.name }}" rules:
{% for rule in ruleset.rules %}Rule #{{ loop.index }}
{{ rule }}
{% endfor %}{% if not loop.last %}
{% endif %}{% endfor %}"#;

/// Render rulesets for a system prompt; empty when there are none.
pub fn render<'a>(rulesets: impl IntoIterator<Item = &'a Ruleset>) -> String {
    let rulesets: Vec<&Ruleset> = rulesets.into_iter().collect();
    if rulesets.iter().all(|r| r.rules.is_empty()) {
        return String::new();
    }

    let env = minijinja::Environment::new();
    match env.render_str(
        RULESETS_TEMPLATE,
        minijinja::context! { rulesets => rulesets },
    ) {
        Ok(text) => text.trim_end().to_owned(),
        Err(e) => {
            tracing::warn!("failed to render rulesets: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_numbered_rules() {
        let rulesets = [
            Ruleset::new("tone", [Rule::new("be polite"), Rule::new("be brief")]),
            Ruleset::new("format", [Rule::new("use markdown")]),
        ];
        let text = render(&rulesets);
        assert_eq!(
            text,
            "Ruleset name: tone\n\"tone\" rules:\nRule #1\nbe polite\nRule #2\nbe brief\n\n\
             Ruleset name: format\n\"format\" rules:\nRule #1\nuse markdown"
        );
    }

    #[test]
    fn empty_rulesets_render_nothing() {
        assert!(render(std::iter::empty()).is_empty());
        assert!(render(&[Ruleset::new("empty", [])]).is_empty());
    }
}
