//! Правки модели маршрутизации.
//!
//! Каждая операция получает текущую модель и возвращает новую, исходная
//! модель не изменяется. При ошибке вызывающий код просто оставляет старую.

use log::info;
use thiserror::Error;

use crate::config::{Integrity, IpMapping, NginxConfig, Upstream, UpstreamServer, DEFAULT_LISTEN_PORT};
use crate::validation::{is_bare_word, is_valid_ipv4};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("upstream '{0}' already exists")]
    DuplicateUpstream(String),

    #[error("upstream '{0}' not found")]
    UnknownUpstream(String),

    #[error("upstream '{0}' is the default upstream and cannot be removed")]
    UpstreamInUse(String),

    #[error("server '{address}' not found in upstream '{upstream}'")]
    UnknownServer { upstream: String, address: String },

    #[error("no upstreams configured")]
    NoUpstreams,

    #[error("invalid IP address '{0}'")]
    InvalidIp(String),

    #[error("IP '{0}' is already mapped")]
    DuplicateIp(String),

    #[error("no mapping for IP '{0}'")]
    UnknownMapping(String),

    #[error("invalid {field} '{value}': expected a single word without spaces, braces, semicolons, quotes or #")]
    InvalidToken { field: &'static str, value: String },
}

pub type EditResult = Result<NginxConfig, EditError>;

/// Применяет правки к модели с заданной строгостью ссылок
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigEditor {
    integrity: Integrity,
}

impl ConfigEditor {
    pub fn new(integrity: Integrity) -> Self {
        Self { integrity }
    }

    pub fn integrity(&self) -> Integrity {
        self.integrity
    }

    /// Добавляет upstream с одним сервером
    pub fn add_upstream(&self, config: &NginxConfig, name: &str, address: &str) -> EditResult {
        let name = token("upstream name", name)?;
        let address = token("server address", address)?;
        if config.upstream(name).is_some() {
            return Err(EditError::DuplicateUpstream(name.to_string()));
        }

        let mut next = config.clone();
        next.upstreams.push(Upstream::new(name, &[address]));
        info!("Added upstream {} ({})", name, address);
        Ok(next)
    }

    /// Удаляет upstream; правила, ссылавшиеся на него, переводятся на default upstream
    pub fn remove_upstream(&self, config: &NginxConfig, name: &str) -> EditResult {
        if config.upstream(name).is_none() {
            return Err(EditError::UnknownUpstream(name.to_string()));
        }
        if self.integrity == Integrity::Strict && config.default_upstream == name {
            return Err(EditError::UpstreamInUse(name.to_string()));
        }

        let mut next = config.clone();
        next.upstreams.retain(|u| u.name != name);
        let mut remapped = 0;
        for mapping in next.ip_mappings.iter_mut().filter(|m| m.upstream == name) {
            mapping.upstream = config.default_upstream.clone();
            remapped += 1;
        }

        info!(
            "Removed upstream {}, {} mapping(s) moved to {}",
            name, remapped, config.default_upstream
        );
        Ok(next)
    }

    /// Переименовывает upstream и обновляет все ссылки на него
    pub fn rename_upstream(&self, config: &NginxConfig, old: &str, new: &str) -> EditResult {
        let new = token("upstream name", new)?;
        if config.upstream(old).is_none() {
            return Err(EditError::UnknownUpstream(old.to_string()));
        }
        if old == new {
            return Ok(config.clone());
        }
        if config.upstream(new).is_some() {
            return Err(EditError::DuplicateUpstream(new.to_string()));
        }

        let mut next = config.clone();
        for upstream in next.upstreams.iter_mut().filter(|u| u.name == old) {
            upstream.name = new.to_string();
        }
        for mapping in next.ip_mappings.iter_mut().filter(|m| m.upstream == old) {
            mapping.upstream = new.to_string();
        }
        if next.default_upstream == old {
            next.default_upstream = new.to_string();
        }

        info!("Renamed upstream {} -> {}", old, new);
        Ok(next)
    }

    pub fn add_server(&self, config: &NginxConfig, upstream: &str, address: &str) -> EditResult {
        let address = token("server address", address)?;
        let mut next = config.clone();
        let target = next
            .upstreams
            .iter_mut()
            .find(|u| u.name == upstream)
            .ok_or_else(|| EditError::UnknownUpstream(upstream.to_string()))?;

        target.servers.push(UpstreamServer::new(address));
        info!("Added server {} to upstream {}", address, upstream);
        Ok(next)
    }

    pub fn remove_server(&self, config: &NginxConfig, upstream: &str, address: &str) -> EditResult {
        let mut next = config.clone();
        let target = next
            .upstreams
            .iter_mut()
            .find(|u| u.name == upstream)
            .ok_or_else(|| EditError::UnknownUpstream(upstream.to_string()))?;

        let before = target.servers.len();
        target.servers.retain(|s| s.address != address);
        if target.servers.len() == before {
            return Err(EditError::UnknownServer {
                upstream: upstream.to_string(),
                address: address.to_string(),
            });
        }

        info!("Removed server {} from upstream {}", address, upstream);
        Ok(next)
    }

    /// Добавляет правило в конец списка.
    /// Пустой upstream заменяется первым upstream из модели.
    pub fn add_mapping(&self, config: &NginxConfig, mapping: IpMapping) -> EditResult {
        let mapping = self.check_mapping(config, mapping)?;
        if config.mapping(&mapping.ip).is_some() {
            return Err(EditError::DuplicateIp(mapping.ip));
        }

        info!("Mapped {} -> {}", mapping.ip, mapping.upstream);
        let mut next = config.clone();
        next.ip_mappings.push(mapping);
        Ok(next)
    }

    /// Заменяет правило для `ip`, позиция в списке сохраняется
    pub fn update_mapping(&self, config: &NginxConfig, ip: &str, mapping: IpMapping) -> EditResult {
        let index = config
            .ip_mappings
            .iter()
            .position(|m| m.ip == ip)
            .ok_or_else(|| EditError::UnknownMapping(ip.to_string()))?;

        let mapping = self.check_mapping(config, mapping)?;
        if mapping.ip != ip && config.mapping(&mapping.ip).is_some() {
            return Err(EditError::DuplicateIp(mapping.ip));
        }

        info!("Updated mapping {} -> {} ({})", ip, mapping.ip, mapping.upstream);
        let mut next = config.clone();
        next.ip_mappings[index] = mapping;
        Ok(next)
    }

    pub fn remove_mapping(&self, config: &NginxConfig, ip: &str) -> EditResult {
        if config.mapping(ip).is_none() {
            return Err(EditError::UnknownMapping(ip.to_string()));
        }

        let mut next = config.clone();
        next.ip_mappings.retain(|m| m.ip != ip);
        info!("Removed mapping for {}", ip);
        Ok(next)
    }

    /// Порт 0 заменяется портом по умолчанию
    pub fn set_listen_port(&self, config: &NginxConfig, port: u16) -> EditResult {
        let port = if port == 0 { DEFAULT_LISTEN_PORT } else { port };
        Ok(NginxConfig {
            listen_port: port,
            ..config.clone()
        })
    }

    pub fn set_default_upstream(&self, config: &NginxConfig, name: &str) -> EditResult {
        let name = token("default upstream", name)?;
        self.require_upstream(config, name)?;
        info!("Default upstream set to {}", name);
        Ok(NginxConfig {
            default_upstream: name.to_string(),
            ..config.clone()
        })
    }

    pub fn set_log_path(&self, config: &NginxConfig, path: &str) -> EditResult {
        let path = token("log path", path)?;
        Ok(NginxConfig {
            log_path: path.to_string(),
            ..config.clone()
        })
    }

    pub fn set_log_format(&self, config: &NginxConfig, name: &str) -> EditResult {
        let name = token("log format", name)?;
        Ok(NginxConfig {
            log_format: name.to_string(),
            ..config.clone()
        })
    }

    fn check_mapping(&self, config: &NginxConfig, mut mapping: IpMapping) -> Result<IpMapping, EditError> {
        mapping.ip = mapping.ip.trim().to_string();
        if !is_valid_ipv4(&mapping.ip) {
            return Err(EditError::InvalidIp(mapping.ip));
        }

        let upstream = mapping.upstream.trim();
        mapping.upstream = if upstream.is_empty() {
            config
                .upstreams
                .first()
                .map(|u| u.name.clone())
                .ok_or(EditError::NoUpstreams)?
        } else {
            token("upstream name", upstream)?.to_string()
        };

        self.require_upstream(config, &mapping.upstream)?;
        Ok(mapping)
    }

    fn require_upstream(&self, config: &NginxConfig, name: &str) -> Result<(), EditError> {
        if self.integrity == Integrity::Strict && config.upstream(name).is_none() {
            return Err(EditError::UnknownUpstream(name.to_string()));
        }
        Ok(())
    }
}

fn token<'a>(field: &'static str, value: &'a str) -> Result<&'a str, EditError> {
    let value = value.trim();
    if is_bare_word(value) {
        Ok(value)
    } else {
        Err(EditError::InvalidToken {
            field,
            value: value.to_string(),
        })
    }
}
