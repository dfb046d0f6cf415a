//! attrconf CLI - Command-line interface for attrconf configuration files
//!
//! Usage:
//!   attrconf dump base.yaml override.yaml --interpolate
//!   attrconf get config.yaml model.dim
//!   attrconf diff base.yaml other.yaml

use attrconf_core::{Config, InterpolateOptions, Value};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, LevelFilter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// attrconf - Hierarchical configuration with placeholder interpolation
#[derive(Parser, Debug)]
#[command(name = "attrconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Merge configuration files in order and print the result
    Dump {
        /// Configuration file(s), later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Interpolate ${...} placeholders
        #[arg(short, long)]
        interpolate: bool,

        /// Copy referenced values instead of sharing them
        #[arg(long)]
        no_variables: bool,

        /// Evaluate interpolated text as arithmetic
        #[arg(long)]
        unsafe_eval: bool,

        /// Keep values from earlier files when keys collide
        #[arg(long)]
        no_overwrite: bool,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get a specific value from the configuration
    Get {
        /// Configuration file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Key or path to the value (e.g., model.dim)
        key: String,

        /// Interpolate ${...} placeholders
        #[arg(short, long)]
        interpolate: bool,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Print the entries of OTHER that BASE lacks or holds differently
    Diff {
        base: PathBuf,
        other: PathBuf,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Print the entries of OTHER that BASE holds with the same value
    Intersect {
        base: PathBuf,
        other: PathBuf,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Quick syntax check of YAML or JSON files
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Dump {
            files,
            interpolate,
            no_variables,
            unsafe_eval,
            no_overwrite,
            format,
            output,
        } => {
            let options = InterpolateOptions {
                use_variable: !no_variables,
                unsafe_eval,
            };
            let interpolate = interpolate.then_some(options);
            cmd_dump(&files, interpolate, !no_overwrite, &format, output)
        }

        Commands::Get {
            files,
            key,
            interpolate,
            format,
            default,
        } => cmd_get(&files, &key, interpolate, &format, default),

        Commands::Diff {
            base,
            other,
            format,
        } => cmd_compare(&base, &other, &format, Config::difference),

        Commands::Intersect {
            base,
            other,
            format,
        } => cmd_compare(&base, &other, &format, Config::intersect),

        Commands::Check { files } => cmd_check(files),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn load_file(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let config = if is_json(path) {
        Config::from_json(&content)
    } else {
        Config::from_yaml(&content)
    };
    config.map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

fn load_config(files: &[PathBuf], overwrite: bool) -> Result<Config, String> {
    let Some((first, rest)) = files.split_first() else {
        return Err("No configuration files specified".to_string());
    };

    let mut config = load_file(first)?;
    for file in rest {
        debug!("Merging {} (overwrite: {})", file.display(), overwrite);
        let next = load_file(file)?;
        config
            .merge_config(&next, overwrite)
            .map_err(|e| format!("Failed to merge {}: {}", file.display(), e))?;
    }

    Ok(config)
}

fn render(config: &Config, format: &str) -> Result<String, String> {
    let rendered = match format {
        "json" => config.to_json().map(|s| s + "\n"),
        "yaml" | "yml" => config.to_yaml(),
        _ => return Err(format!("Unsupported format: {}. Use yaml or json.", format)),
    };
    rendered.map_err(|e| e.to_string())
}

fn render_value(value: &Value, format: &str) -> Result<String, String> {
    let value = value.unwrap_variables();
    match format {
        "json" => serde_json::to_string_pretty(&value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::to_string(&value).map_err(|e| e.to_string()),
        _ => match &value {
            Value::Null => Ok("null\n".to_string()),
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_yaml::to_string(&value).map_err(|e| e.to_string())
            }
            scalar => Ok(format!("{}\n", scalar)),
        },
    }
}

fn emit(content: &str, output: Option<PathBuf>) -> ExitCode {
    match output {
        Some(output_path) => {
            if let Err(e) = std::fs::write(&output_path, content) {
                eprintln!("{}: {}", "Error writing file".red(), e);
                return ExitCode::from(2);
            }
            eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
        }
        None => print!("{}", content),
    }
    ExitCode::SUCCESS
}

fn cmd_dump(
    files: &[PathBuf],
    interpolate: Option<InterpolateOptions>,
    overwrite: bool,
    format: &str,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut config = match load_config(files, overwrite) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    if let Some(options) = interpolate {
        if let Err(e) = config.interpolate_with(options) {
            eprintln!("{} Interpolation failed\n", "✗".red());
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    }

    match render(&config, format) {
        Ok(content) => emit(&content, output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn lookup(config: &Config, key: &str) -> Option<Value> {
    if let Ok(value) = config.get(key) {
        return Some(value.clone());
    }
    config.to_value().get_path(key).ok().cloned()
}

fn cmd_get(
    files: &[PathBuf],
    key: &str,
    interpolate: bool,
    format: &str,
    default: Option<String>,
) -> ExitCode {
    let mut config = match load_config(files, true) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    if interpolate {
        if let Err(e) = config.interpolate() {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    }

    match lookup(&config, key) {
        Some(value) => match render_value(&value, format) {
            Ok(content) => {
                print!("{}", content);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        },
        None => match default {
            Some(default_val) => {
                println!("{}", default_val);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("{}: Key '{}' not found", "Error".red(), key);
                ExitCode::from(1)
            }
        },
    }
}

fn cmd_compare(
    base: &Path,
    other: &Path,
    format: &str,
    op: fn(&Config, &Value) -> attrconf_core::Result<Config>,
) -> ExitCode {
    let loaded = load_file(base).and_then(|base| Ok((base, load_file(other)?)));
    let (base, other) = match loaded {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = op(&base, &other.to_value()).map_err(|e| e.to_string());
    match result.and_then(|config| render(&config, format)) {
        Ok(content) => emit(&content, None),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
                continue;
            }
        };

        let json = is_json(&file);
        let parse_result: Result<Value, String> = if json {
            serde_json::from_str(&content).map_err(|e| format!("Invalid JSON: {}", e))
        } else {
            serde_yaml::from_str(&content).map_err(|e| format!("Invalid YAML: {}", e))
        };

        match parse_result {
            Ok(_) => {
                println!(
                    "{} {}: valid {}",
                    "✓".green(),
                    file.display(),
                    if json { "JSON" } else { "YAML" }
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("attrconf-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_dump() {
        let cli = Cli::try_parse_from([
            "attrconf",
            "dump",
            "a.yaml",
            "b.yaml",
            "--interpolate",
            "--no-variables",
            "-f",
            "json",
        ])
        .unwrap();
        assert!(!cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Dump {
                files: vec!["a.yaml".into(), "b.yaml".into()],
                interpolate: true,
                no_variables: true,
                unsafe_eval: false,
                no_overwrite: false,
                format: "json".into(),
                output: None,
            }
        );
    }

    #[test]
    fn test_parse_get_with_default() {
        let cli =
            Cli::try_parse_from(["attrconf", "-v", "get", "a.yaml", "model.dim", "-d", "8"]).unwrap();
        assert!(cli.verbose);
        let Commands::Get {
            files, key, default, ..
        } = cli.command
        else {
            panic!("expected get");
        };
        assert_eq!(files, vec![PathBuf::from("a.yaml")]);
        assert_eq!(key, "model.dim");
        assert_eq!(default.as_deref(), Some("8"));
    }

    #[test]
    fn test_parse_diff_requires_two_files() {
        assert!(Cli::try_parse_from(["attrconf", "diff", "a.yaml"]).is_err());
        assert!(Cli::try_parse_from(["attrconf", "intersect", "a.yaml", "b.yaml"]).is_ok());
    }

    #[test]
    fn test_parse_requires_files() {
        assert!(Cli::try_parse_from(["attrconf", "dump"]).is_err());
        assert!(Cli::try_parse_from(["attrconf", "check"]).is_err());
    }

    #[test]
    fn test_load_config_merges_in_order() {
        let base = write_temp("merge-base.yaml", "a: 1\nn:\n  x: 1\n");
        let over = write_temp("merge-over.json", r#"{"a": 2, "n": {"y": 2}}"#);

        let config = load_config(&[base.clone(), over.clone()], true).unwrap();
        assert_eq!(config.get("a").unwrap(), &Value::Integer(2));
        assert_eq!(lookup(&config, "n.x"), Some(Value::Integer(1)));
        assert_eq!(lookup(&config, "n.y"), Some(Value::Integer(2)));

        let config = load_config(&[base, over], false).unwrap();
        assert_eq!(config.get("a").unwrap(), &Value::Integer(1));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(&[PathBuf::from("/nonexistent/attrconf.yaml")], true).unwrap_err();
        assert!(err.contains("Failed to read"));
        assert!(load_config(&[], true).is_err());
    }

    #[test]
    fn test_render_value_text() {
        assert_eq!(render_value(&Value::from("x"), "text").unwrap(), "x\n");
        assert_eq!(render_value(&Value::Null, "text").unwrap(), "null\n");
        assert_eq!(render_value(&Value::from(vec![1, 2]), "text").unwrap(), "- 1\n- 2\n");
        assert_eq!(render_value(&Value::Integer(3), "json").unwrap(), "3\n");
    }

    #[test]
    fn test_render_rejects_unknown_format() {
        let config = Config::from_yaml("a: 1").unwrap();
        assert!(render(&config, "toml").is_err());
        assert_eq!(render(&config, "yaml").unwrap(), "a: 1\n");
    }
}
