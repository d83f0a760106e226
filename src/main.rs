use std::fs;
use std::path::Path;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{info, warn};

use tcp_router::config::{load_config_file, load_model_file, Settings};
use tcp_router::logging::init_logging;
use tcp_router::{check, serialize_config, ConfigEditor, NginxConfig};

const DEFAULT_SETTINGS_PATH: &str = "/etc/tcp-router/settings.yaml";

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn cli() -> Command {
    let output = Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .help("Write the result to FILE instead of stdout");

    Command::new("tcp-router")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate and parse nginx stream configs for IP-based TCP routing")
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .global(true)
            .help("Settings file path (default: /etc/tcp-router/settings.yaml)"))
        .arg(Arg::new("test")
            .short('t')
            .long("test")
            .value_name("FILE")
            .help("Test nginx configuration file and exit"))
        .subcommand(Command::new("parse")
            .about("Parse an nginx config and print the routing model")
            .arg(Arg::new("file").required(true).value_name("FILE"))
            .arg(Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["yaml", "json"])
                .default_value("yaml")))
        .subcommand(Command::new("render")
            .about("Render an nginx config from a YAML/JSON model")
            .arg(Arg::new("model").required(true).value_name("MODEL"))
            .arg(output.clone()))
        .subcommand(Command::new("fmt")
            .about("Rewrite an nginx config in canonical form")
            .arg(Arg::new("file").required(true).value_name("FILE"))
            .arg(output.clone()))
        .subcommand(Command::new("default")
            .about("Print the built-in example configuration")
            .arg(Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["nginx", "yaml", "json"])
                .default_value("nginx")))
        .subcommand(Command::new("rename")
            .about("Rename an upstream and update every reference to it")
            .arg(Arg::new("file").required(true).value_name("FILE"))
            .arg(Arg::new("old").required(true).value_name("OLD"))
            .arg(Arg::new("new").required(true).value_name("NEW"))
            .arg(output)
            .arg(Arg::new("in-place")
                .short('i')
                .long("in-place")
                .action(ArgAction::SetTrue)
                .conflicts_with("output")
                .help("Overwrite FILE with the result")))
        .subcommand_required(false)
        .arg_required_else_help(true)
}

fn main() {
    let matches = cli().get_matches();

    let settings = load_settings(matches.get_one::<String>("config"));
    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Failed to initialize logging: {}, falling back to env_logger", e);
        let _ = env_logger::try_init();
    }

    // Проверка конфигурации (как nginx -t)
    if let Some(file) = matches.get_one::<String>("test") {
        std::process::exit(test_configuration(file));
    }

    if let Err(e) = run(&matches, &settings) {
        eprintln!("tcp-router: [error] {}", e);
        std::process::exit(1);
    }
}

/// Настройки из файла; если файла нет, используются значения по умолчанию
fn load_settings(path: Option<&String>) -> Settings {
    let path = match path {
        Some(path) => path.as_str(),
        None if Path::new(DEFAULT_SETTINGS_PATH).exists() => DEFAULT_SETTINGS_PATH,
        None => return Settings::default(),
    };

    Settings::load_from_file(path).unwrap_or_else(|e| {
        eprintln!("Failed to load settings from {}: {}", path, e);
        eprintln!("Using default settings");
        Settings::default()
    })
}

fn run(matches: &ArgMatches, settings: &Settings) -> CliResult {
    match matches.subcommand() {
        Some(("parse", sub)) => {
            let config = load_config_file(required(sub, "file")?)?;
            let text = match sub.get_one::<String>("format").map(String::as_str) {
                Some("json") => serde_json::to_string_pretty(&config)? + "\n",
                _ => serde_yaml::to_string(&config)?,
            };
            emit(&text, None)
        }
        Some(("render", sub)) => {
            let config = load_model_file(required(sub, "model")?)?;
            report_issues(&config);
            emit(&serialize_config(&config), sub.get_one::<String>("output"))
        }
        Some(("fmt", sub)) => {
            let config = load_config_file(required(sub, "file")?)?;
            emit(&serialize_config(&config), sub.get_one::<String>("output"))
        }
        Some(("default", sub)) => {
            let config = NginxConfig::default();
            let text = match sub.get_one::<String>("format").map(String::as_str) {
                Some("yaml") => serde_yaml::to_string(&config)?,
                Some("json") => serde_json::to_string_pretty(&config)? + "\n",
                _ => serialize_config(&config),
            };
            emit(&text, None)
        }
        Some(("rename", sub)) => {
            let file = required(sub, "file")?;
            let config = load_config_file(file)?;
            let editor = ConfigEditor::new(settings.editing.integrity);
            let renamed = editor.rename_upstream(&config, required(sub, "old")?, required(sub, "new")?)?;

            let target = if sub.get_flag("in-place") {
                Some(file)
            } else {
                sub.get_one::<String>("output")
            };
            emit(&serialize_config(&renamed), target)
        }
        _ => Err("no command given, see --help".into()),
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String, Box<dyn std::error::Error>> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| format!("missing argument <{}>", id).into())
}

/// Пишет результат в файл или в stdout
fn emit(text: &str, output: Option<&String>) -> CliResult {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Wrote {}", path);
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Предупреждения о модели перед генерацией конфига не мешают выводу
fn report_issues(config: &NginxConfig) {
    for issue in &check(config).issues {
        warn!("{}", issue);
    }
}

/// Проверка конфигурации (как nginx -t). Возвращает код выхода.
fn test_configuration(path: &str) -> i32 {
    println!("tcp-router: testing configuration file {} ...", path);

    let config = match load_config_file(path) {
        Ok(config) => config,
        Err(e) => {
            println!("tcp-router: [error] configuration file {} test failed: {}", path, e);
            return 1;
        }
    };

    println!(
        "tcp-router: listen {}, {} upstream(s), {} mapping(s), default upstream '{}'",
        config.listen_port,
        config.upstreams.len(),
        config.ip_mappings.len(),
        config.default_upstream
    );
    for upstream in &config.upstreams {
        println!(
            "tcp-router: upstream '{}' has {} server(s), {} mapping(s)",
            upstream.name,
            upstream.servers.len(),
            config.usage(&upstream.name)
        );
    }

    let report = check(&config);
    for issue in &report.issues {
        println!("tcp-router: {}", issue);
    }

    let errors = report.errors().count();
    let warnings = report.warnings().count();
    if errors > 0 {
        println!("tcp-router: configuration file {} test failed", path);
        1
    } else if warnings > 0 {
        println!("tcp-router: configuration file {} test is successful (with {} warning(s))", path, warnings);
        0
    } else {
        println!("tcp-router: configuration file {} test is successful", path);
        0
    }
}
