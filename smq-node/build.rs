//! Build script for smq-node
//!
//! - Sets up linker search paths for memory.x
//! - Validates node.toml and turns it into constants

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Longest name a node can advertise
const MAX_NAME_LEN: usize = 12;

fn main() {
    setup_linker();
    generate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validated contents of node.toml
struct NodeConfig {
    name: String,
    baudrate: u32,
    heartbeat_period_ms: u32,
}

/// Validate node.toml and write `node_config.rs` to OUT_DIR
fn generate_config() {
    println!("cargo:rerun-if-changed=node.toml");

    let config_path = Path::new("node.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: node.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a node.toml configuration file.           ║\n\
            ║  Please create one in the smq-node directory.                    ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read node.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in node.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&e.to_string())
            );
        }
    };

    let config = match validate(&value) {
        Ok(config) => config,
        Err(errors) => {
            let list = errors.join("\n");
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: node.toml validation failed                              ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&list)
            );
        }
    };

    write_config(&config);
    println!("cargo:warning=node.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate(config: &toml::Value) -> Result<NodeConfig, Vec<String>> {
    let mut errors = Vec::new();

    let name = match config.get("node").and_then(|n| n.get("name")) {
        Some(toml::Value::String(name)) if name.is_empty() => {
            errors.push("[node] name must not be empty".to_string());
            String::new()
        }
        Some(toml::Value::String(name)) if name.len() > MAX_NAME_LEN => {
            errors.push(format!(
                "[node] name '{}' is {} bytes (max {})",
                name,
                name.len(),
                MAX_NAME_LEN
            ));
            String::new()
        }
        Some(toml::Value::String(name)) => name.clone(),
        Some(_) => {
            errors.push("[node] name must be a string".to_string());
            String::new()
        }
        None => {
            errors.push("Missing [node] name".to_string());
            String::new()
        }
    };

    let baudrate = positive_u32(config, "serial", "baudrate", Some(115_200), &mut errors);
    let heartbeat_period_ms = positive_u32(config, "heartbeat", "period_ms", None, &mut errors);

    if errors.is_empty() {
        Ok(NodeConfig {
            name,
            baudrate,
            heartbeat_period_ms,
        })
    } else {
        Err(errors)
    }
}

/// Read a `[section] key` integer in 1..=u32::MAX
fn positive_u32(
    config: &toml::Value,
    section: &str,
    key: &str,
    default: Option<u32>,
    errors: &mut Vec<String>,
) -> u32 {
    match config.get(section).and_then(|s| s.get(key)) {
        Some(toml::Value::Integer(v)) if *v > 0 && *v <= u32::MAX as i64 => *v as u32,
        Some(toml::Value::Integer(v)) => {
            errors.push(format!("[{}] {} = {} is out of range", section, key, v));
            0
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            0
        }
        None => match default {
            Some(v) => v,
            None => {
                errors.push(format!("Missing [{}] {}", section, key));
                0
            }
        },
    }
}

fn write_config(config: &NodeConfig) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut f = File::create(out_dir.join("node_config.rs")).unwrap();
    writeln!(f, "/// Name reported in the heartbeat").unwrap();
    writeln!(f, "pub const NODE_NAME: &str = {:?};", config.name).unwrap();
    writeln!(f, "/// Serial link speed").unwrap();
    writeln!(f, "pub const BAUD_RATE: u32 = {};", config.baudrate).unwrap();
    writeln!(f, "/// Heartbeat publish period").unwrap();
    writeln!(
        f,
        "pub const HEARTBEAT_PERIOD_MS: u32 = {};",
        config.heartbeat_period_ms
    )
    .unwrap();
}
