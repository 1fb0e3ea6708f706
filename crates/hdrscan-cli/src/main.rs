//! hdrscan CLI
//!
//! Command-line front end for parsing C headers into a definition store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use hdrscan_core::config;
use hdrscan_parser::{Definition, HeaderParser, Kind};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hdrscan")]
#[command(author, version, about = "C header declaration scanner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse headers and print the extracted definitions
    Parse {
        /// Header files, parsed in order
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Predefine a macro (NAME or NAME=VALUE)
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,

        /// Add a header search directory
        #[arg(short = 'I', long = "include")]
        includes: Vec<PathBuf>,

        /// Cache file to read and write
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Look up one name across every definition kind
    Lookup {
        /// Header file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Name to look up
        #[arg(value_name = "NAME")]
        name: String,

        /// Predefine a macro (NAME or NAME=VALUE)
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            files,
            defines,
            includes,
            cache,
            format,
            output,
        } => cmd_parse(&files, &defines, &includes, cache.as_deref(), &format, output.as_deref()),
        Commands::Lookup {
            file,
            name,
            defines,
        } => cmd_lookup(&file, &name, &defines),
    }
}

fn build_parser(includes: &[PathBuf], defines: &[String]) -> HeaderParser {
    let mut cfg = config::current_defaults();
    cfg.header_search_paths.extend(includes.iter().cloned());
    let mut parser = HeaderParser::with_config(cfg);
    for d in defines {
        match d.split_once('=') {
            Some((name, value)) => parser.define(name, value),
            None => parser.define(d.as_str(), ""),
        }
    }
    parser
}

fn cmd_parse(
    files: &[PathBuf],
    defines: &[String],
    includes: &[PathBuf],
    cache: Option<&Path>,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut parser = build_parser(includes, defines);
    for file in files {
        parser.add_file(file)?;
        println!("📂 Added: {}", file.display());
    }

    let store = parser.process_all(cache)?;

    if format == "json" {
        let json = serde_json::to_string_pretty(store)?;
        if let Some(out_path) = output {
            std::fs::write(out_path, &json)?;
            println!("   Output written to: {}", out_path.display());
        } else {
            println!("{}", json);
        }
    } else {
        for kind in Kind::ALL {
            let entries = store.iterate(kind);
            println!("   {}: {}", kind.name(), entries.len());
        }
    }

    let diagnostics = parser.diagnostics();
    if !diagnostics.is_empty() {
        eprintln!("{} warning(s):", diagnostics.len());
        for d in diagnostics {
            eprintln!("  {}", d);
        }
    }

    Ok(())
}

fn cmd_lookup(file: &Path, name: &str, defines: &[String]) -> Result<()> {
    let mut parser = build_parser(&[], defines);
    parser.add_file(file)?;
    let store = parser.parse()?;

    let mut found = false;
    for kind in Kind::ALL {
        let def = match store.get(kind, name) {
            Some(d) => d,
            None => continue,
        };
        found = true;
        match def {
            Definition::Type(ty) => {
                println!("types: typedef {}", ty.declaration(Some(name)));
                match store.resolve(ty) {
                    Ok(resolved) => println!("  resolves to: {}", resolved),
                    Err(e) => println!("  does not resolve: {}", e),
                }
            }
            Definition::Variable(v) => {
                println!("variables: {}", v.ty.declaration(Some(name)));
                if let Some(value) = &v.value {
                    println!("  value: {}", value);
                }
            }
            Definition::Macro(m) => {
                println!(
                    "macros: #define {} {}",
                    name,
                    hdrscan_core::token::render(&m.body)
                );
            }
            Definition::FnMacro(m) => {
                println!(
                    "fnmacros: #define {}({}) {}",
                    name,
                    m.params.join(", "),
                    hdrscan_core::token::render(&m.body)
                );
            }
            Definition::Record(r) => {
                println!("{}s: {} {}", r.kind.keyword(), r.kind.keyword(), r.name);
                for field in &r.fields {
                    let field_name = field.name.as_deref().unwrap_or("<anonymous>");
                    match field.bit_width {
                        Some(bits) => {
                            println!("  {} : {}", field.ty.declaration(Some(field_name)), bits)
                        }
                        None => println!("  {}", field.ty.declaration(Some(field_name))),
                    }
                }
                println!("  pack: {}", r.pack_value());
            }
            Definition::Enum(e) => {
                println!("enums: enum {}", e.name);
                for (member, value) in &e.members {
                    println!("  {} = {}", member, value);
                }
            }
            Definition::Function(f) => {
                let params: Vec<String> = f
                    .params
                    .iter()
                    .map(|p| p.ty.declaration(p.name.as_deref()))
                    .collect();
                println!(
                    "functions: {} {}({})",
                    f.return_type,
                    f.name,
                    params.join(", ")
                );
                if let Some(cc) = &f.call_conv {
                    println!("  calling convention: {}", cc);
                }
            }
            Definition::Value(v) => {
                println!("values: {} = {}", name, v);
            }
        }
    }

    if !found {
        println!("'{}' not found in any definition kind", name);
    }

    Ok(())
}
