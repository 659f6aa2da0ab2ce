use bigsister_core::{AppConfig, SelfTestPolicy};
use bigsister_plugin::{Diagnostics, FeatureManager, LoadOutcome, Params};
use bigsister_tools::{builtin_catalog, BUILTIN_VERSION};
use serde_json::json;

#[test]
fn test_every_builtin_resolves() {
    let config = AppConfig::default();
    let catalog = builtin_catalog();

    assert_eq!(catalog.len(), config.features.len());
    for definition in &config.features {
        assert!(
            catalog
                .resolve(definition.id.as_str(), BUILTIN_VERSION)
                .is_some(),
            "no entry point for {}",
            definition.id
        );
    }
}

#[test]
fn test_builtins_load_in_definition_order() {
    let config = AppConfig::default();
    let manager = FeatureManager::from_config(&config, &builtin_catalog());

    let report = manager.report();
    assert_eq!(report.scanned, 5);
    assert_eq!(report.loaded, 5);
    assert_eq!(report.failed, 0);

    let ids: Vec<&str> = manager.features().map(|f| f.id().as_str()).collect();
    assert_eq!(ids, vec!["exiftool_scraper", "zsteg", "steghide", "binwalk", "iris"]);

    let available = manager.get_available_features();
    assert_eq!(available["iris"].display_name, "IRIS (Reverse Image Search)");
    assert_eq!(available["binwalk"].version, BUILTIN_VERSION);

    assert_eq!(manager.shutdown(), 5);
    assert_eq!(manager.shutdown(), 0);
}

#[test]
fn test_unknown_version_is_module_missing() {
    let mut config = AppConfig::default();
    config.manager.self_test = SelfTestPolicy::Advisory;
    config.features[3] = config.features[3].clone().with("version", "v9_9");

    let manager = FeatureManager::from_config(&config, &builtin_catalog());
    assert_eq!(
        manager.report().outcome("binwalk"),
        Some(&LoadOutcome::ModuleMissing {
            version: "v9_9".to_string()
        })
    );
    assert_eq!(manager.report().loaded, 4);
    manager.shutdown();
}

#[test]
fn test_menu_and_invalid_path_through_manager() {
    let manager = FeatureManager::from_config(&AppConfig::default(), &builtin_catalog());
    let mut diagnostics = Diagnostics::new();

    let menu = manager
        .invoke_feature("zsteg", None, &Params::new(), &mut diagnostics)
        .expect("render menu");
    let menu = menu.as_str().expect("menu html");
    assert!(menu.contains("runFeature('zsteg', 'scan_html')"));

    let mut params = Params::new();
    params.insert("file_path".to_string(), json!("/definitely/not/here.png"));
    let result = manager
        .invoke_feature("zsteg", Some("scan_json"), &params, &mut diagnostics)
        .expect("scan_json returns a payload");
    assert_eq!(result["ok"], json!(false));
    assert_eq!(result["errors"], json!("No file selected or invalid path."));

    manager.shutdown();
}
