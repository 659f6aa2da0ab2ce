use bigsister_bridge::{envelope, InvocationBridge};
use bigsister_core::{FeatureDefinition, FeatureId, FeatureSettings};
use bigsister_plugin::{
    ActionError, ActionResult, EasyOptions, Feature, FeatureCatalog, FeatureManager,
    InvocationContext, ManagerOptions, Params, Registration,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Feature whose default action returns a fixed value or error.
struct Fixed(ActionResult);

impl Feature for Fixed {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, _params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        if ctx.debug() {
            ctx.print("debug on");
        }
        self.0.clone()
    }
}

struct Menu;
impl Feature for Menu {}

fn bridge_with(id: &str, result: ActionResult) -> InvocationBridge {
    let catalog = FeatureCatalog::new().with(id, "v1_0", move || {
        Ok(Registration::new(Arc::new(Fixed(result.clone()))))
    });
    bridge_for(&catalog, &[id])
}

fn bridge_for(catalog: &FeatureCatalog, ids: &[&str]) -> InvocationBridge {
    let definitions: Vec<FeatureDefinition> = ids
        .iter()
        .map(|id| FeatureDefinition::new(FeatureId::new(*id).expect("valid feature ID")))
        .collect();
    let manager = FeatureManager::load(
        &FeatureSettings::default(),
        &definitions,
        catalog,
        ManagerOptions::default(),
    );
    InvocationBridge::new(manager)
}

fn value(envelope: envelope::Envelope) -> Value {
    Value::Object(envelope)
}

#[test]
fn test_default_action_html() {
    let bridge = bridge_with("alpha", Ok(json!("<h2>ok</h2>")));
    let result = bridge.invoke("alpha", None, &Params::new());
    assert_eq!(value(result), json!({"ok": true, "html": "<h2>ok</h2>"}));
}

#[test]
fn test_default_action_mapping() {
    let bridge = bridge_with("alpha", Ok(json!({"x": 1})));
    let result = bridge.invoke("alpha", None, &Params::new());
    assert_eq!(value(result), json!({"ok": true, "json": {"x": 1}}));
}

#[test]
fn test_default_action_error() {
    let bridge = bridge_with("alpha", Err(ActionError::new("ValueError", "bad input")));
    let result = bridge.invoke("alpha", None, &Params::new());
    assert_eq!(
        value(result),
        json!({"ok": false, "error": "ValueError: bad input"})
    );
}

#[test]
fn test_unknown_feature() {
    let bridge = bridge_with("alpha", Ok(json!(1)));
    let result = bridge.invoke("ghost", None, &Params::new());
    assert_eq!(
        value(result),
        json!({"ok": false, "error": "Unknown feature 'ghost'"})
    );
}

#[test]
fn test_default_aliases() {
    let bridge = bridge_with("alpha", Ok(json!("done")));

    for option in ["", "default", "run_default", "run"] {
        let result = bridge.invoke("alpha", Some(option), &Params::new());
        assert_eq!(
            value(result),
            json!({"ok": true, "result": "done"}),
            "alias {option:?}"
        );
    }

    let result = bridge.invoke("alpha", Some("scan"), &Params::new());
    assert_eq!(
        value(result),
        json!({"ok": false, "error": "Feature 'alpha' has no easy options"})
    );
}

#[test]
fn test_envelope_always_has_boolean_ok() {
    let returns = [
        Ok(json!({"tool": "x"})),
        Ok(json!("{\"a\": [1]}")),
        Ok(json!("<p>hi</p>")),
        Ok(json!(3.5)),
        Ok(json!(true)),
        Ok(Value::Null),
        Ok(json!({"ok": "truthy"})),
        Err(ActionError::timeout("binwalk", 120)),
    ];

    for returned in returns {
        let bridge = bridge_with("alpha", returned.clone());
        let result = bridge.invoke("alpha", None, &Params::new());
        assert!(result["ok"].is_boolean(), "no boolean ok for {returned:?}");
    }
}

#[test]
fn test_options_and_menu() {
    let catalog = FeatureCatalog::new().with("menu", "v1_0", || {
        let options = EasyOptions::new("Pick one:")
            .option("echo", "Echo", |params, _| Ok(Value::Object(params.clone())))
            .option("noisy", "Noisy", |_, ctx| {
                ctx.print("working");
                ctx.eprint("careful");
                Ok(json!("<b>done</b>"))
            })
            .option("boom", "Boom", |_, _| panic!("exploded"));
        Ok(Registration::new(Arc::new(Menu)).with_easy_options(options))
    });
    let bridge = bridge_for(&catalog, &["menu"]);

    let mut params = Params::new();
    params.insert("file_path".to_string(), json!("/tmp/x"));
    let result = bridge.invoke("menu", Some("echo"), &params);
    assert_eq!(
        value(result),
        json!({"ok": true, "json": {"file_path": "/tmp/x"}})
    );

    let result = bridge.invoke("menu", Some("noisy"), &Params::new());
    assert_eq!(
        value(result),
        json!({
            "ok": true,
            "html": "<b>done</b>",
            "_prints": {"stdout": "working\n", "stderr": "careful\n"}
        })
    );

    let result = bridge.invoke("menu", Some("missing"), &Params::new());
    assert_eq!(
        value(result),
        json!({"ok": false, "error": "Option 'missing' not found"})
    );

    let result = bridge.invoke("menu", Some("boom"), &Params::new());
    assert_eq!(result["ok"], json!(false));
    assert_eq!(result["error"], json!("Panic: exploded"));

    // No option renders the menu
    let result = bridge.invoke("menu", None, &Params::new());
    let html = result["html"].as_str().expect("menu html");
    assert!(html.contains("runFeature('menu', 'noisy')"));
}

#[test]
fn test_list() {
    let catalog = FeatureCatalog::new()
        .with("menu", "v1_0", || {
            let options = EasyOptions::new("Pick one:")
                .option("b", "Bee", |_, _| Ok(json!(1)))
                .option("a", "Ay", |_, _| Ok(json!(2)));
            Ok(Registration::new(Arc::new(Menu)).with_easy_options(options))
        })
        .with("alpha", "v1_0", || {
            Ok(Registration::new(Arc::new(Fixed(Ok(json!(1))))))
        });

    let definitions = vec![
        FeatureDefinition::new(FeatureId::new("menu").expect("valid feature ID"))
            .with("display_name", "Menu Feature")
            .with("icon", "M"),
        FeatureDefinition::new(FeatureId::new("alpha").expect("valid feature ID")),
    ];
    let manager = FeatureManager::load(
        &FeatureSettings::default(),
        &definitions,
        &catalog,
        ManagerOptions::default(),
    );
    let bridge = InvocationBridge::new(manager);

    let listing = bridge.list();
    assert_eq!(listing["ok"], json!(true));

    let features = listing["features"].as_array().expect("features array");
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["id"], json!("menu"));
    assert_eq!(features[0]["label"], json!("Menu Feature"));
    assert_eq!(features[0]["icon"], json!("M"));
    assert_eq!(features[0]["version"], json!("v1_0"));
    assert_eq!(
        features[0]["options"],
        json!([{"id": "b", "label": "Bee"}, {"id": "a", "label": "Ay"}])
    );
    assert_eq!(features[1]["id"], json!("alpha"));
    assert_eq!(features[1]["options"], json!([]));
}

#[test]
fn test_shutdown_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let catalog = FeatureCatalog::new().with("alpha", "v1_0", move || {
        let counter = Arc::clone(&counter);
        Ok(Registration::new(Arc::new(Fixed(Ok(json!(1))))).with_shutdown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    });

    let bridge = bridge_for(&catalog, &["alpha"]);
    assert!(bridge.shutdown());
    assert!(!bridge.shutdown());
    assert!(bridge.is_shut_down());
    drop(bridge);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_runs_shutdown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let catalog = FeatureCatalog::new().with("alpha", "v1_0", move || {
        let counter = Arc::clone(&counter);
        Ok(Registration::new(Arc::new(Fixed(Ok(json!(1))))).with_shutdown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    });

    drop(bridge_for(&catalog, &["alpha"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debug_flag_reaches_actions() {
    let catalog = FeatureCatalog::new().with("alpha", "v1_0", || {
        Ok(Registration::new(Arc::new(Fixed(Ok(json!("x"))))))
    });
    let definitions = [FeatureDefinition::new(
        FeatureId::new("alpha").expect("valid feature ID"),
    )];
    let manager = FeatureManager::load(
        &FeatureSettings::default(),
        &definitions,
        &catalog,
        ManagerOptions {
            debug: true,
            ..ManagerOptions::default()
        },
    );
    let bridge = InvocationBridge::new(manager);

    let params = Params::new();
    let result = bridge.invoke("alpha", None, &params);
    assert_eq!(result["_prints"], json!({"stdout": "debug on\n"}));
    assert!(params.is_empty());
}
