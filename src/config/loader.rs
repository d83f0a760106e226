use std::fs;
use std::path::Path;

use log::info;

use super::nginx_parser::parse_config;
use super::serializer::serialize_config;
use super::types::NginxConfig;

/// Читает nginx конфиг из файла и разбирает его в модель
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<NginxConfig, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content);

    info!(
        "Loaded config from: {} ({} upstream(s), {} mapping(s))",
        path.display(),
        config.upstreams.len(),
        config.ip_mappings.len()
    );
    Ok(config)
}

/// Записывает модель в файл в виде nginx конфига
pub fn write_config_file<P: AsRef<Path>>(path: P, config: &NginxConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.as_ref();
    fs::write(path, serialize_config(config))?;
    info!("Wrote config to: {}", path.display());
    Ok(())
}

/// Читает модель из YAML (.yaml/.yml) или JSON (всё остальное)
pub fn load_model_file<P: AsRef<Path>>(path: P) -> Result<NginxConfig, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let config = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(config)
}

/// Сохраняет модель в YAML или JSON в зависимости от расширения
pub fn save_model_file<P: AsRef<Path>>(path: P, config: &NginxConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.as_ref();

    let content = if is_yaml(path) {
        serde_yaml::to_string(config)?
    } else {
        serde_json::to_string_pretty(config)?
    };
    fs::write(path, content)?;
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
