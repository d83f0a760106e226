//! Проверка модели перед выкладкой (аналог `nginx -t`).
//!
//! Парсер и сериализатор ничего не проверяют, все предупреждения для
//! оператора собираются здесь.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::NginxConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.label(), self.message)
    }
}

/// Результат проверки модели
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    fn error(&mut self, message: String) {
        self.issues.push(Issue { severity: Severity::Error, message });
    }

    fn warning(&mut self, message: String) {
        self.issues.push(Issue { severity: Severity::Warning, message });
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Нет ни одной ошибки (предупреждения допускаются)
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Слово, которое можно безопасно подставить в директиву nginx.
/// `#` запрещён: парсер считает его началом комментария.
pub fn is_bare_word(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ';' | '#' | '\'' | '"'))
}

/// IPv4 в виде четырёх октетов по 1-3 цифры, каждый не больше 255
pub fn is_valid_ipv4(ip: &str) -> bool {
    let octets: Vec<&str> = ip.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            (1..=3).contains(&octet.len())
                && octet.chars().all(|c| c.is_ascii_digit())
                && octet.parse::<u16>().map_or(false, |n| n <= 255)
        })
}

/// Проверяет модель и собирает все найденные проблемы
pub fn check(config: &NginxConfig) -> Report {
    let mut report = Report::default();

    if config.listen_port == 0 {
        report.error("listen port 0 is not a valid port".to_string());
    }
    for (field, value) in [
        ("log path", &config.log_path),
        ("log format", &config.log_format),
        ("default upstream", &config.default_upstream),
    ] {
        if !is_bare_word(value) {
            report.error(format!("{} '{}' is not a single word", field, value));
        }
    }

    if config.upstreams.is_empty() {
        report.warning("no upstreams configured".to_string());
    }

    let mut names = HashSet::new();
    for upstream in &config.upstreams {
        if !names.insert(upstream.name.as_str()) {
            report.error(format!("duplicate upstream '{}'", upstream.name));
        }
        if !is_bare_word(&upstream.name) {
            report.error(format!("upstream name '{}' is not a single word", upstream.name));
        }
        if upstream.servers.is_empty() {
            report.error(format!("upstream '{}' has no servers", upstream.name));
        }
        for server in &upstream.servers {
            if !is_bare_word(&server.address) {
                report.error(format!(
                    "server address '{}' in upstream '{}' is not a single word",
                    server.address, upstream.name
                ));
            }
        }
    }

    if !config.upstreams.is_empty() && !names.contains(config.default_upstream.as_str()) {
        report.error(format!("default upstream '{}' not found", config.default_upstream));
    }

    let mut ips = HashSet::new();
    for mapping in &config.ip_mappings {
        if !ips.insert(mapping.ip.as_str()) {
            report.error(format!("duplicate mapping for {}", mapping.ip));
        }
        if !is_valid_ipv4(&mapping.ip) {
            report.warning(format!("'{}' is not a valid IPv4 address", mapping.ip));
        }
        if !names.contains(mapping.upstream.as_str()) {
            report.error(format!(
                "upstream '{}' not found for mapping {}",
                mapping.upstream, mapping.ip
            ));
        }
    }

    for upstream in &config.upstreams {
        if upstream.name != config.default_upstream && config.usage(&upstream.name) == 0 {
            report.warning(format!("upstream '{}' is never used", upstream.name));
        }
    }

    report
}
