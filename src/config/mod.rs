use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub mod loader;
pub mod nginx_parser;
pub mod serializer;
pub mod types;

pub use loader::*;
pub use nginx_parser::*;
pub use serializer::*;
pub use types::*;

/// Настройки приложения (YAML). Модель маршрутизации здесь не хранится,
/// она живёт в nginx конфиге.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    pub version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editing: EditingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,  // error, warn, info, debug, trace
    pub format: String, // text или json
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EditingConfig {
    #[serde(default)]
    pub integrity: Integrity,
}

/// Строгость проверки ссылок на upstream при редактировании модели
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrity {
    /// Висячие ссылки допускаются и выводятся в конфиг как есть
    #[default]
    Lenient,
    /// Правки, оставляющие висячие ссылки, отклоняются
    Strict,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            logging: LoggingConfig::default(),
            editing: EditingConfig::default(),
        }
    }
}

impl Settings {
    /// Загружает настройки из YAML файла
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Сохраняет настройки в YAML файл
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Базовая конфигурация: используется, когда текста для разбора нет
impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            default_upstream: "printer_down".to_string(),
            upstreams: vec![
                Upstream::new("printer_down", &["10.1.0.11:9100"]),
                Upstream::new("printer_up", &["10.1.0.12:9100"]),
            ],
            ip_mappings: vec![
                IpMapping::new("10.1.0.30", "printer_down"),
                IpMapping::new("10.1.0.31", "printer_down"),
                IpMapping::new("10.1.0.32", "printer_up"),
                IpMapping::new("10.1.0.33", "printer_up"),
                IpMapping::new("10.1.0.34", "printer_up"),
            ],
            log_path: "/var/log/nginx/tcp_router_9100.log".to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}
