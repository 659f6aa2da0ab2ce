//! Option registry ("easy options"): named sub-actions of one feature.

use crate::contract::{Action, ActionResult, InvocationContext, Params};
use crate::error::{PluginError, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Public description of one registered option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionInfo {
    /// Option identifier, unique within its feature
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// Capability interface for a per-feature table of named actions.
pub trait OptionRegistry: Send + Sync {
    /// Register an action. A repeated `option_id` replaces the earlier entry.
    fn add_option(&mut self, option_id: &str, label: &str, action: Action);

    /// Bind the registry to its owning feature.
    fn set_feature_name(&mut self, name: &str);

    /// Look up the action registered under `option_id`.
    fn get_option_callable(&self, option_id: &str) -> Result<Action>;

    /// Render a menu of every option.
    ///
    /// # Errors
    /// Returns `PluginError::InvalidState` if no feature name was bound.
    fn render(&self) -> Result<String>;

    /// Registered options in registration order.
    fn list(&self) -> Vec<OptionInfo>;
}

struct OptionEntry {
    id: String,
    label: String,
    action: Action,
}

/// Default [`OptionRegistry`] rendering an HTML button menu.
pub struct EasyOptions {
    title: String,
    feature_name: Option<String>,
    options: Vec<OptionEntry>,
}

impl EasyOptions {
    /// Create an empty registry whose menu shows `title`.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            feature_name: None,
            options: Vec::new(),
        }
    }

    /// Register a closure as an option. Convenience over [`OptionRegistry::add_option`].
    #[must_use]
    pub fn option(
        mut self,
        option_id: &str,
        label: &str,
        action: impl Fn(&Params, &mut InvocationContext<'_>) -> ActionResult + Send + Sync + 'static,
    ) -> Self {
        self.add_option(option_id, label, Arc::new(action));
        self
    }

    /// The feature this registry is bound to, if any.
    #[must_use]
    pub fn feature_name(&self) -> Option<&str> {
        self.feature_name.as_deref()
    }

    /// Number of registered options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no options are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl OptionRegistry for EasyOptions {
    fn add_option(&mut self, option_id: &str, label: &str, action: Action) {
        if let Some(entry) = self.options.iter_mut().find(|entry| entry.id == option_id) {
            entry.label = label.to_string();
            entry.action = action;
        } else {
            self.options.push(OptionEntry {
                id: option_id.to_string(),
                label: label.to_string(),
                action,
            });
        }
    }

    fn set_feature_name(&mut self, name: &str) {
        self.feature_name = Some(name.to_string());
    }

    fn get_option_callable(&self, option_id: &str) -> Result<Action> {
        self.options
            .iter()
            .find(|entry| entry.id == option_id)
            .map(|entry| Arc::clone(&entry.action))
            .ok_or_else(|| PluginError::OptionNotFound {
                option: option_id.to_string(),
            })
    }

    fn render(&self) -> Result<String> {
        let feature = self.feature_name.as_deref().ok_or_else(|| {
            PluginError::InvalidState(
                "option registry has no feature name; call set_feature_name first".to_string(),
            )
        })?;

        let mut html = String::new();
        html.push_str("<div class=\"easy-options\">\n");
        let _ = writeln!(html, "  <p>{}</p>", escape_html(&self.title));
        for entry in &self.options {
            let _ = writeln!(
                html,
                "  <button onclick=\"runFeature('{}', '{}')\">{}</button>",
                escape_html(feature),
                escape_html(&entry.id),
                escape_html(&entry.label),
            );
        }
        html.push_str("</div>\n");

        Ok(html)
    }

    fn list(&self) -> Vec<OptionInfo> {
        self.options
            .iter()
            .map(|entry| OptionInfo {
                id: entry.id.clone(),
                label: entry.label.clone(),
            })
            .collect()
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Diagnostics;
    use bigsister_core::FeatureId;
    use serde_json::{json, Value};

    fn invoke(action: &Action, params: &Params) -> ActionResult {
        let id = FeatureId::new("test").expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(false, &id, &mut diagnostics);
        action(params, &mut ctx)
    }

    #[test]
    fn test_add_and_get_option() {
        let options = EasyOptions::new("Choose:").option("x", "X", |params, _| {
            Ok(json!({ "seen": params.len() }))
        });

        let action = options.get_option_callable("x").expect("get option");
        let mut params = Params::new();
        params.insert("a".to_string(), json!(1));

        assert_eq!(invoke(&action, &params).expect("run"), json!({"seen": 1}));
    }

    #[test]
    fn test_get_missing_option() {
        let options = EasyOptions::new("Choose:");
        let result = options.get_option_callable("nope");
        assert!(matches!(result, Err(PluginError::OptionNotFound { .. })));
    }

    #[test]
    fn test_duplicate_option_last_write_wins() {
        let options = EasyOptions::new("Choose:")
            .option("scan", "Scan v1", |_, _| Ok(json!(1)))
            .option("help", "Help", |_, _| Ok(json!("help")))
            .option("scan", "Scan v2", |_, _| Ok(json!(2)));

        assert_eq!(options.len(), 2);

        let listed = options.list();
        assert_eq!(listed[0].id, "scan");
        assert_eq!(listed[0].label, "Scan v2");
        assert_eq!(listed[1].id, "help");

        let action = options.get_option_callable("scan").expect("get option");
        assert_eq!(invoke(&action, &Params::new()).expect("run"), json!(2));
    }

    #[test]
    fn test_render_requires_feature_name() {
        let options = EasyOptions::new("Choose:").option("a", "A", |_, _| Ok(Value::Null));
        assert!(matches!(
            options.render(),
            Err(PluginError::InvalidState(_))
        ));
    }

    #[test]
    fn test_render_lists_options_in_order() {
        let mut options = EasyOptions::new("Binwalk – Choose an action:")
            .option("help", "Help / Tips", |_, _| Ok(Value::Null))
            .option("scan_html", "Signature Scan (HTML)", |_, _| Ok(Value::Null));
        options.set_feature_name("binwalk");

        let html = options.render().expect("render menu");
        assert!(html.contains("Binwalk – Choose an action:"));

        let help = html
            .find("runFeature('binwalk', 'help')")
            .expect("help button");
        let scan = html
            .find("runFeature('binwalk', 'scan_html')")
            .expect("scan button");
        assert!(help < scan);
        assert!(html.contains(">Help / Tips</button>"));
    }

    #[test]
    fn test_render_escapes_labels() {
        let mut options =
            EasyOptions::new("<script>").option("x", "a & b", |_, _| Ok(Value::Null));
        options.set_feature_name("f");

        let html = options.render().expect("render menu");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}
