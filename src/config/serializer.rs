use std::fmt;

use super::types::{NginxConfig, Upstream};

/// Генерирует канонический текст stream конфига nginx из модели.
///
/// Вывод детерминирован: одна и та же модель всегда даёт один и тот же текст.
/// Значения не экранируются, пробел, `{` или `;` внутри имени испортят конфиг.
pub fn serialize_config(config: &NginxConfig) -> String {
    let map_entries = std::iter::once(format!("    default {};", config.default_upstream))
        .chain(
            config
                .ip_mappings
                .iter()
                .map(|m| format!("    {} {};", m.ip, m.upstream)),
        )
        .collect::<Vec<_>>()
        .join("\n");

    let upstream_blocks = config
        .upstreams
        .iter()
        .map(render_upstream)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"load_module modules/ngx_stream_module.so;

worker_processes auto;

events {{
  worker_connections 1024;
}}

stream {{
  log_format {log_format}
    'ts=$time_local msec=$msec '
    '$remote_addr:$remote_port -> $upstream_addr '
    'status=$status bytes_sent=$bytes_sent bytes_received=$bytes_received '
    'time=$session_time';

  access_log {log_path} {log_format};

  map $remote_addr $printer_upstream {{
{map_entries}
  }}

{upstream_blocks}

  server {{
    listen {listen_port};
    proxy_pass $printer_upstream;
  }}
}}
"#,
        log_format = config.log_format,
        log_path = config.log_path,
        map_entries = map_entries,
        upstream_blocks = upstream_blocks,
        listen_port = config.listen_port,
    )
}

fn render_upstream(upstream: &Upstream) -> String {
    let servers = upstream
        .servers
        .iter()
        .map(|s| format!("  server {};", s.address))
        .collect::<Vec<_>>()
        .join("\n");

    format!("upstream {} {{\n{}\n}}", upstream.name, servers)
}

impl fmt::Display for NginxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize_config(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::IpMapping;

    #[test]
    fn test_serialize_default_config() {
        let text = serialize_config(&NginxConfig::default());

        assert!(text.starts_with("load_module modules/ngx_stream_module.so;\n\nworker_processes auto;\n"));
        assert!(text.contains("events {\n  worker_connections 1024;\n}"));
        assert!(text.contains("  log_format tcp_router\n    'ts=$time_local msec=$msec '\n"));
        assert!(text.contains("    'time=$session_time';\n"));
        assert!(text.contains("  access_log /var/log/nginx/tcp_router_9100.log tcp_router;\n"));
        assert!(text.contains(
            "  map $remote_addr $printer_upstream {\n    default printer_down;\n    10.1.0.30 printer_down;\n"
        ));
        assert!(text.contains(
            "upstream printer_down {\n  server 10.1.0.11:9100;\n}\n\nupstream printer_up {\n  server 10.1.0.12:9100;\n}"
        ));
        assert!(text.ends_with("  server {\n    listen 9100;\n    proxy_pass $printer_upstream;\n  }\n}\n"));
    }

    #[test]
    fn test_mapping_lines_follow_model_order() {
        let mut config = NginxConfig::default();
        config.ip_mappings = vec![
            IpMapping::new("10.1.0.34", "printer_up"),
            IpMapping::new("10.1.0.30", "printer_down"),
        ];

        let text = serialize_config(&config);
        let first = text.find("10.1.0.34 printer_up;").unwrap();
        let second = text.find("10.1.0.30 printer_down;").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_metadata_not_emitted() {
        let mut config = NginxConfig::default();
        config.ip_mappings[0] = config.ip_mappings[0].clone().with_name("Kasse 30");

        let text = serialize_config(&config);
        assert!(!text.contains("Kasse"));
        assert_eq!(text, serialize_config(&config.without_metadata()));
    }

    #[test]
    fn test_upstream_without_servers() {
        let upstream = Upstream::new("empty", &[]);
        assert_eq!(render_upstream(&upstream), "upstream empty {\n\n}");
    }

    #[test]
    fn test_display_matches_serialize() {
        let config = NginxConfig::default();
        assert_eq!(config.to_string(), serialize_config(&config));
    }

    #[test]
    fn test_dangling_reference_emitted_verbatim() {
        let mut config = NginxConfig::default();
        config.default_upstream = "ghost".to_string();

        assert!(serialize_config(&config).contains("    default ghost;\n"));
    }
}
