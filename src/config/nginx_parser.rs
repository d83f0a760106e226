use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{IpMapping, NginxConfig, Upstream, UpstreamServer};

/// Порт по умолчанию, если директива listen не найдена
pub const DEFAULT_LISTEN_PORT: u16 = 9100;
/// Путь access_log по умолчанию
pub const DEFAULT_LOG_PATH: &str = "/var/log/nginx/tcp_router.log";
/// Имя log_format по умолчанию
pub const DEFAULT_LOG_FORMAT: &str = "tcp_router";
/// default upstream, если нет ни map блока, ни upstream блоков
pub const FALLBACK_UPSTREAM: &str = "printer_down";

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#.*$").expect("invalid comment pattern"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace pattern"));
static LISTEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"listen\s+(\d+)").expect("invalid listen pattern"));
static ACCESS_LOG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"access_log\s+(\S+)\s").expect("invalid access_log pattern"));
static LOG_FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"log_format\s+(\S+)\s+['"]"#).expect("invalid log_format pattern"));
static UPSTREAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"upstream\s+(\S+)\s*\{([^}]+)\}").expect("invalid upstream pattern"));
static SERVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"server\s+(\S+);").expect("invalid server pattern"));
static MAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"map\s+\$remote_addr\s+\$\w+\s*\{([^}]+)\}").expect("invalid map pattern")
});
static MAP_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s+(\S+);").expect("invalid map entry pattern"));

/// Парсит текст stream конфига nginx в структурированную модель.
///
/// Парсер толерантный: всё, что не удалось найти, заменяется значением
/// по умолчанию. Поддерживаются только одноуровневые блоки
/// (`upstream`, `map`), вложенные скобки внутри них не разбираются.
pub fn parse_config(raw: &str) -> NginxConfig {
    let text = normalize(raw);

    let listen_port = parse_listen_port(&text);
    let log_path = capture_first(&ACCESS_LOG_RE, &text).unwrap_or_else(|| {
        debug!("access_log not found, using {}", DEFAULT_LOG_PATH);
        DEFAULT_LOG_PATH.to_string()
    });
    let log_format = capture_first(&LOG_FORMAT_RE, &text).unwrap_or_else(|| {
        debug!("log_format not found, using {}", DEFAULT_LOG_FORMAT);
        DEFAULT_LOG_FORMAT.to_string()
    });

    let upstreams = parse_upstreams(&text);
    let fallback = upstreams
        .first()
        .map(|u| u.name.clone())
        .unwrap_or_else(|| FALLBACK_UPSTREAM.to_string());
    let (default_upstream, ip_mappings) = parse_map(&text, fallback);

    debug!(
        "Parsed config: listen {}, {} upstream(s), {} mapping(s)",
        listen_port,
        upstreams.len(),
        ip_mappings.len()
    );

    NginxConfig {
        listen_port,
        default_upstream,
        upstreams,
        ip_mappings,
        log_path,
        log_format,
    }
}

impl NginxConfig {
    /// То же, что [`parse_config`]
    pub fn parse(raw: &str) -> Self {
        parse_config(raw)
    }
}

/// Удаляет комментарии и схлопывает все пробельные символы в один пробел
fn normalize(raw: &str) -> String {
    let without_comments = raw
        .lines()
        .map(|line| COMMENT_RE.replace(line, ""))
        .collect::<Vec<_>>()
        .join("\n");

    WHITESPACE_RE
        .replace_all(&without_comments, " ")
        .trim()
        .to_string()
}

fn capture_first(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Первый `listen <число>`; переполнение u16 считается неразобранным значением
fn parse_listen_port(text: &str) -> u16 {
    match capture_first(&LISTEN_RE, text).map(|port| port.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            debug!("Invalid listen port ({}), using {}", e, DEFAULT_LISTEN_PORT);
            DEFAULT_LISTEN_PORT
        }
        None => {
            debug!("listen directive not found, using {}", DEFAULT_LISTEN_PORT);
            DEFAULT_LISTEN_PORT
        }
    }
}

/// Все upstream блоки в порядке их появления в тексте
fn parse_upstreams(text: &str) -> Vec<Upstream> {
    UPSTREAM_RE
        .captures_iter(text)
        .map(|cap| {
            let name = cap[1].to_string();
            let servers = SERVER_RE
                .captures_iter(&cap[2])
                .map(|s| UpstreamServer::new(&s[1]))
                .collect();
            Upstream { name, servers }
        })
        .collect()
}

/// Разбирает `map $remote_addr $... { ... }`.
/// Возвращает default upstream и правила в порядке тела блока.
fn parse_map(text: &str, fallback: String) -> (String, Vec<IpMapping>) {
    let mut default_upstream = fallback;
    let mut ip_mappings = Vec::new();

    let Some(cap) = MAP_RE.captures(text) else {
        debug!("map block not found, default upstream is {}", default_upstream);
        return (default_upstream, ip_mappings);
    };

    for entry in MAP_ENTRY_RE.captures_iter(&cap[1]) {
        let key = &entry[1];
        let value = entry[2].trim_end_matches(';');

        if key == "default" {
            default_upstream = value.to_string();
        } else {
            ip_mappings.push(IpMapping::new(key, value));
        }
    }

    (default_upstream, ip_mappings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRETTY: &str = r#"
        load_module modules/ngx_stream_module.so;
        worker_processes auto;
        events {
            worker_connections 1024;
        }
        stream {
            log_format tcp_router
                'ts=$time_local msec=$msec '
                'time=$session_time';
            access_log /var/log/nginx/tcp_router_9100.log tcp_router;

            map $remote_addr $printer_upstream {
                default printer_down;
                10.1.0.30 printer_down;
                10.1.0.32 printer_up;
            }

            upstream printer_down {
                server 10.1.0.11:9100;
            }

            upstream printer_up {
                server 10.1.0.12:9100;
                server 10.1.0.13:9100;
            }

            server {
                listen 9101;
                proxy_pass $printer_upstream;
            }
        }
    "#;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = parse_config("");

        assert_eq!(config.listen_port, 9100);
        assert_eq!(config.log_path, "/var/log/nginx/tcp_router.log");
        assert_eq!(config.log_format, "tcp_router");
        assert!(config.upstreams.is_empty());
        assert!(config.ip_mappings.is_empty());
        assert_eq!(config.default_upstream, "printer_down");
    }

    #[test]
    fn test_parse_formatted_config() {
        let config = parse_config(PRETTY);

        assert_eq!(config.listen_port, 9101);
        assert_eq!(config.log_path, "/var/log/nginx/tcp_router_9100.log");
        assert_eq!(config.log_format, "tcp_router");
        assert_eq!(config.default_upstream, "printer_down");

        assert_eq!(config.upstreams.len(), 2);
        assert_eq!(config.upstreams[0], Upstream::new("printer_down", &["10.1.0.11:9100"]));
        assert_eq!(
            config.upstreams[1],
            Upstream::new("printer_up", &["10.1.0.12:9100", "10.1.0.13:9100"])
        );

        assert_eq!(
            config.ip_mappings,
            vec![
                IpMapping::new("10.1.0.30", "printer_down"),
                IpMapping::new("10.1.0.32", "printer_up"),
            ]
        );
    }

    #[test]
    fn test_minified_and_pretty_are_equal() {
        let minified = PRETTY.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(parse_config(&minified), parse_config(PRETTY));
    }

    #[test]
    fn test_mapping_order_preserved() {
        let config = parse_config(
            "map $remote_addr $x { 10.1.0.32 printer_up; 10.1.0.30 printer_down; default printer_up; }",
        );

        let ips: Vec<&str> = config.ip_mappings.iter().map(|m| m.ip.as_str()).collect();
        assert_eq!(ips, vec!["10.1.0.32", "10.1.0.30"]);
        assert_eq!(config.default_upstream, "printer_up");
    }

    #[test]
    fn test_default_falls_back_to_first_upstream() {
        let config = parse_config("upstream alpha { server 1.1.1.1:1; } upstream beta { server 2.2.2.2:2; }");
        assert_eq!(config.default_upstream, "alpha");
    }

    #[test]
    fn test_empty_map_body_keeps_fallback() {
        // Пустое тело map не даёт правил, default остаётся fallback
        let config = parse_config("map $remote_addr $x { } upstream only { server a:1; }");
        assert!(config.ip_mappings.is_empty());
        assert_eq!(config.default_upstream, "only");

        let config = parse_config("map $remote_addr $x { ; }");
        assert!(config.ip_mappings.is_empty());
        assert_eq!(config.default_upstream, "printer_down");
    }

    #[test]
    fn test_duplicate_upstream_names_kept() {
        let config = parse_config("upstream a { server x:1; } upstream a { server y:2; }");
        assert_eq!(config.upstreams.len(), 2);
        assert_eq!(config.upstreams[1].servers[0].address, "y:2");
    }

    #[test]
    fn test_malformed_server_address_is_opaque() {
        let config = parse_config("upstream a { server not-an-address; server :::; }");
        let addresses: Vec<&str> = config.upstreams[0].servers.iter().map(|s| s.address.as_str()).collect();
        assert_eq!(addresses, vec!["not-an-address", ":::"]);
    }

    #[test]
    fn test_invalid_listen_port_defaults() {
        assert_eq!(parse_config("server { listen 70000; }").listen_port, 9100);
        assert_eq!(parse_config("server { listen abc; }").listen_port, 9100);
        assert_eq!(parse_config("server { listen 80 ; listen 81; }").listen_port, 80);
    }

    #[test]
    fn test_log_format_requires_quote() {
        // Без пробела перед кавычкой имя формата не распознаётся
        let config = parse_config("log_format custom'ts=$time_local'; access_log /tmp/a.log custom;");
        assert_eq!(config.log_format, "tcp_router");
        assert_eq!(config.log_path, "/tmp/a.log");

        let config = parse_config("log_format custom \"ts=$time_local\";");
        assert_eq!(config.log_format, "custom");
    }

    #[test]
    fn test_comments_are_ignored() {
        let config = parse_config(
            "# listen 8080;\nserver {\n  listen 9200; # main port\n}\n# upstream old { server 1.2.3.4:1; }\n",
        );
        assert_eq!(config.listen_port, 9200);
        assert!(config.upstreams.is_empty());
    }

    #[test]
    fn test_garbage_input_does_not_fail() {
        let config = parse_config("}}}{{{ ;;; upstream { map $remote_addr {");
        assert_eq!(config.listen_port, 9100);
        assert!(config.ip_mappings.is_empty());
    }
}
