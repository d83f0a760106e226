use serde::{Deserialize, Serialize};

/// Один backend в группе upstream ("host:port", не разбирается на части)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamServer {
    pub address: String,
}

impl UpstreamServer {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

/// Именованная группа backend серверов
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Upstream {
    pub name: String,
    /// Порядок серверов = порядок в сгенерированном конфиге
    #[serde(default)]
    pub servers: Vec<UpstreamServer>,
}

impl Upstream {
    pub fn new(name: impl Into<String>, addresses: &[&str]) -> Self {
        Self {
            name: name.into(),
            servers: addresses.iter().map(|a| UpstreamServer::new(*a)).collect(),
        }
    }
}

/// Тип подключения клиента (только для отображения, в конфиг не попадает)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConnectionType {
    #[serde(rename = "LAN")]
    Lan,
    #[serde(rename = "WLAN")]
    Wlan,
}

/// Правило маршрутизации: IP клиента -> upstream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    pub ip: String,
    pub upstream: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
}

impl IpMapping {
    pub fn new(ip: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            upstream: upstream.into(),
            name: None,
            connection_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }
}

/// Структурированная модель stream конфигурации nginx
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NginxConfig {
    pub listen_port: u16,
    pub default_upstream: String,
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
    #[serde(default)]
    pub ip_mappings: Vec<IpMapping>,
    pub log_path: String,
    pub log_format: String,
}

impl NginxConfig {
    /// Находит upstream по имени
    pub fn upstream(&self, name: &str) -> Option<&Upstream> {
        self.upstreams.iter().find(|u| u.name == name)
    }

    /// Находит правило по IP
    pub fn mapping(&self, ip: &str) -> Option<&IpMapping> {
        self.ip_mappings.iter().find(|m| m.ip == ip)
    }

    pub fn upstream_names(&self) -> Vec<&str> {
        self.upstreams.iter().map(|u| u.name.as_str()).collect()
    }

    /// Сколько правил направляют трафик в upstream
    pub fn usage(&self, name: &str) -> usize {
        self.ip_mappings.iter().filter(|m| m.upstream == name).count()
    }

    /// Копия модели без метаданных отображения (name, connectionType).
    /// Ровно эта часть модели переживает round trip через текст конфига.
    pub fn without_metadata(&self) -> Self {
        let mut config = self.clone();
        for mapping in &mut config.ip_mappings {
            mapping.name = None;
            mapping.connection_type = None;
        }
        config
    }
}
