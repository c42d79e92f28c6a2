//! verconf CLI - Command-line interface for versioned config files
//!
//! Usage:
//!   verconf check config.yaml rules.jsonnet
//!   verconf version config.yaml
//!   verconf dump legacy.yaml --format yaml --output upgraded.yaml

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use verconf_core::{
    sniff_version, Error, JsonnetCommand, LatestConfig, RawDocument, Reader, VersionTag,
};

/// verconf - Versioned configuration loading with upgrade-on-read
#[derive(Parser)]
#[command(name = "verconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Jsonnet binary used to evaluate .jsonnet files
    #[arg(long, global = true, env = "VERCONF_JSONNET", default_value = "jsonnet")]
    jsonnet: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that config files load and resolve to the latest version
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the version declared by a YAML config file
    Version {
        /// Configuration file
        file: PathBuf,
    },

    /// Print a config file migrated to the latest version
    Dump {
        /// Configuration file to dump
        file: PathBuf,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let reader = Reader::with_evaluator(JsonnetCommand::new(cli.jsonnet));

    match cli.command {
        Commands::Check { files } => cmd_check(&reader, files),
        Commands::Version { file } => cmd_version(&file),
        Commands::Dump {
            file,
            format,
            output,
        } => cmd_dump(&reader, &file, &format, output),
    }
}

/// Render a load failure with its details and help text
fn describe(file: &Path, err: &Error) -> String {
    let mut msg = if err.is_not_found() {
        format!("{}: file not found", file.display())
    } else {
        format!("Failed to load {}: {}", file.display(), err)
    };
    msg.push_str(&err.details());
    if let Some(help) = err.help() {
        msg.push_str(&format!("\n  Help: {}", help));
    }
    msg
}

fn load_config(reader: &Reader, file: &Path) -> Result<LatestConfig, String> {
    reader.read_file(file).map_err(|e| describe(file, &e))
}

fn cmd_check(reader: &Reader, files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        match load_config(reader, &file) {
            Ok(config) => {
                println!(
                    "{} {}: valid ({})",
                    "✓".green(),
                    file.display(),
                    config.version
                );
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
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

fn read_version(file: &Path) -> Result<VersionTag, String> {
    RawDocument::read(file)
        .and_then(|doc| sniff_version(doc.bytes()))
        .map_err(|e| describe(file, &e))
}

fn cmd_version(file: &Path) -> ExitCode {
    match read_version(file) {
        Ok(tag) if tag.is_absent() => {
            println!("<none>");
            ExitCode::SUCCESS
        }
        Ok(tag) => {
            println!("{}", tag);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.red());
            ExitCode::from(2)
        }
    }
}

fn cmd_dump(reader: &Reader, file: &Path, format: &str, output: Option<PathBuf>) -> ExitCode {
    let config = match load_config(reader, file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = match format {
        "json" => serde_json::to_string_pretty(&config)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::to_string(&config).map_err(|e| e.to_string()),
        _ => {
            eprintln!("Unsupported format: {}. Use yaml or json.", format);
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(content) => {
            if let Some(output_path) = output {
                if let Err(e) = std::fs::write(&output_path, &content) {
                    eprintln!("{}: {}", "Error writing file".red(), e);
                    return ExitCode::from(2);
                }
                eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
            } else {
                print!("{}", content);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}
