use std::fs;

use tempfile::tempdir;

use crate::kernel::error::Result;
use crate::storage::config::{ConfigData, ConfigFormat, ConfigLoader, PluginConfigScope};
use crate::storage::error::StorageError;

#[test]
fn test_config_data_basic() -> Result<()> {
    let mut config = ConfigData::new();

    config.set("string_value", "hello")?;
    config.set("int_value", 42)?;
    config.set("bool_value", true)?;
    config.set("array", vec![1, 2, 3])?;

    assert_eq!(config.get::<String>("string_value").unwrap(), "hello");
    assert_eq!(config.get::<i32>("int_value").unwrap(), 42);
    assert_eq!(config.get::<bool>("bool_value").unwrap(), true);
    assert_eq!(config.get::<Vec<i32>>("array").unwrap(), vec![1, 2, 3]);

    assert_eq!(config.get_or("missing_key", "default".to_string()), "default");
    assert!(config.get::<i32>("string_value").is_none(), "Wrong shape reads as absent");

    assert!(config.contains_key("int_value"));
    assert_eq!(config.keys(), vec!["array", "bool_value", "int_value", "string_value"]);

    Ok(())
}

#[test]
fn test_try_get_reports_wrong_shape() -> Result<()> {
    let mut config = ConfigData::new();
    config.set("port", "not a number")?;

    assert!(config.try_get::<u16>("missing")?.is_none());
    match config.try_get::<u16>("port") {
        Err(StorageError::InvalidValue { key, .. }) => assert_eq!(key, "port"),
        other => panic!("Expected InvalidValue, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_section_and_merge() -> Result<()> {
    let mut config = ConfigData::new();
    config.set("audio", serde_json::json!({ "sample_rate": 16000, "channels": 1 }))?;
    config.set("plain", 3)?;

    let audio = config.section("audio");
    assert_eq!(audio.get::<u32>("sample_rate"), Some(16000));
    assert!(config.section("plain").is_empty());
    assert!(config.section("absent").is_empty());

    let mut overrides = ConfigData::new();
    overrides.set("plain", 4)?;
    overrides.set("extra", true)?;
    config.merge(&overrides);
    assert_eq!(config.get::<i32>("plain"), Some(4));
    assert_eq!(config.get::<bool>("extra"), Some(true));
    assert!(config.contains_key("audio"));

    Ok(())
}

#[test]
fn test_config_serialization() -> Result<()> {
    let mut config = ConfigData::new();
    config.set("string_value", "hello")?;
    config.set("int_value", 42)?;
    config.set("bool_value", true)?;

    let json_str = config.serialize(ConfigFormat::Json)?;
    let deserialized = ConfigData::deserialize(&json_str, ConfigFormat::Json)?;
    assert_eq!(deserialized, config);

    #[cfg(feature = "yaml-config")]
    {
        let yaml_str = config.serialize(ConfigFormat::Yaml)?;
        let yaml_deserialized = ConfigData::deserialize(&yaml_str, ConfigFormat::Yaml)?;
        assert_eq!(yaml_deserialized.get::<String>("string_value").unwrap(), "hello");
        assert_eq!(yaml_deserialized.get::<i32>("int_value").unwrap(), 42);
    }

    #[cfg(feature = "toml-config")]
    {
        let toml_str = config.serialize(ConfigFormat::Toml)?;
        let toml_deserialized = ConfigData::deserialize(&toml_str, ConfigFormat::Toml)?;
        assert_eq!(toml_deserialized.get::<String>("string_value").unwrap(), "hello");
        assert_eq!(toml_deserialized.get::<bool>("bool_value").unwrap(), true);
    }

    Ok(())
}

#[test]
fn test_malformed_file_is_a_deserialization_error() {
    assert!(matches!(
        ConfigData::deserialize("{ not json", ConfigFormat::Json),
        Err(StorageError::DeserializationError { .. })
    ));
}

#[test]
fn test_format_from_path() {
    use std::path::Path;
    assert_eq!(ConfigFormat::from_path(Path::new("a/talkie.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("talkie.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("talkie.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("talkie")), None);
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("talkie.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("talkie.toml")), Some(ConfigFormat::Toml));
}

#[test]
fn test_missing_files_read_as_empty() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let loader = ConfigLoader::new(dir.path());

    assert!(loader.load_app_config()?.is_empty());
    assert!(loader.load_plugin_config("audio")?.is_empty());
    assert!(loader.list_plugin_configs(PluginConfigScope::User)?.is_empty());
    Ok(())
}

#[test]
fn test_load_app_config_json() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(
        dir.path().join("talkie.json"),
        r#"{ "plugin_manager": { "under_test": true }, "device_name": "kitchen" }"#,
    )
    .expect("Failed to write config");

    let config = ConfigLoader::new(dir.path()).load_app_config()?;
    assert_eq!(config.get::<String>("device_name").unwrap(), "kitchen");
    assert_eq!(config.section("plugin_manager").get::<bool>("under_test"), Some(true));
    Ok(())
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_load_app_config_yaml() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(dir.path().join("talkie.yml"), "device_name: garage\nvolume: 7\n").expect("Failed to write config");

    let config = ConfigLoader::new(dir.path()).load_app_config()?;
    assert_eq!(config.get::<String>("device_name").unwrap(), "garage");
    assert_eq!(config.get::<u8>("volume"), Some(7));
    Ok(())
}

#[cfg(feature = "toml-config")]
#[test]
fn test_load_app_config_toml() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(
        dir.path().join("talkie.toml"),
        "device_name = \"attic\"\n\n[plugin_manager]\ndetect_slow_init_process = true\n",
    )
    .expect("Failed to write config");

    let config = ConfigLoader::new(dir.path()).load_app_config()?;
    assert_eq!(config.get::<String>("device_name").unwrap(), "attic");
    assert_eq!(
        config.section("plugin_manager").get::<bool>("detect_slow_init_process"),
        Some(true)
    );
    Ok(())
}

#[test]
fn test_plugin_user_config_overrides_defaults() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let loader = ConfigLoader::new(dir.path());

    let mut defaults = ConfigData::new();
    defaults.set("sample_rate", 16000)?;
    defaults.set("channels", 1)?;
    let default_path = loader.save_plugin_config("audio", &defaults, PluginConfigScope::Default)?;
    assert!(default_path.ends_with("plugins/default/audio.json"));

    let mut user = ConfigData::new();
    user.set("sample_rate", 48000)?;
    loader.save_plugin_config("audio", &user, PluginConfigScope::User)?;

    let merged = loader.load_plugin_config("audio")?;
    assert_eq!(merged.get::<u32>("sample_rate"), Some(48000));
    assert_eq!(merged.get::<u32>("channels"), Some(1));

    let only_defaults = loader.load_plugin_scope("audio", PluginConfigScope::Default)?;
    assert_eq!(only_defaults.get::<u32>("sample_rate"), Some(16000));
    Ok(())
}

#[test]
fn test_list_plugin_configs() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let loader = ConfigLoader::new(dir.path());
    for name in ["transport", "audio"] {
        loader.save_plugin_config(name, &ConfigData::new(), PluginConfigScope::Default)?;
    }
    fs::write(dir.path().join("plugins/default/notes.txt"), "ignored").expect("Failed to write file");

    assert_eq!(loader.list_plugin_configs(PluginConfigScope::Default)?, vec!["audio", "transport"]);
    Ok(())
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_save_in_configured_format() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    let loader = ConfigLoader::new(dir.path()).with_default_format(ConfigFormat::Yaml);

    let mut config = ConfigData::new();
    config.set("level", "debug")?;
    let path = loader.save_plugin_config("core-logging", &config, PluginConfigScope::User)?;

    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("yaml"));
    assert_eq!(
        loader.load_plugin_config("core-logging")?.get::<String>("level").unwrap(),
        "debug"
    );
    Ok(())
}

#[test]
fn test_load_file_rejects_unknown_extension() {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("talkie.ini");
    fs::write(&path, "x=1").expect("Failed to write file");

    assert!(matches!(
        ConfigLoader::new(dir.path()).load_file(&path),
        Err(StorageError::UnsupportedConfigFormat(_))
    ));
}
