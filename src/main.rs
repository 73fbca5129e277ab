//! criteria command-line interface.
//!
//! Compiles a query against an entity schema and prints the backend-native
//! form.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use criteria::catalog::EntitySchema;
use criteria::compiler::{
    compile, ElasticsearchCompiler, Mappings, MemoryCompiler, QueryCompiler, SqlCompiler,
};
use criteria::expression::{FilterParser, Query};
use serde_json::json;
use tracing_subscriber::EnvFilter;

enum Source {
    File(PathBuf),
    Sql(String),
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut schema: Option<PathBuf> = None;
    let mut source: Option<Source> = None;
    let mut backend = String::from("elasticsearch");
    let mut verbose = false;
    let mut mappings = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-s" | "--schema" => {
                i += 1;
                schema = args.get(i).map(PathBuf::from);
            }
            "-q" | "--query" => {
                i += 1;
                source = args.get(i).map(|p| Source::File(PathBuf::from(p)));
            }
            "--sql" => {
                i += 1;
                source = args.get(i).map(|s| Source::Sql(s.clone()));
            }
            "-b" | "--backend" => {
                i += 1;
                if let Some(name) = args.get(i) {
                    backend = name.clone();
                }
            }
            "-m" | "--mappings" => {
                mappings = true;
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("criteria v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    init_tracing(verbose);

    if mappings {
        let Some(schema) = schema else {
            eprintln!("Error: --mappings requires --schema");
            return ExitCode::FAILURE;
        };
        return report(index_mappings(&schema));
    }

    let (Some(schema), Some(source)) = (schema, source) else {
        eprintln!("Error: --schema and one of --query or --sql are required");
        print_help();
        return ExitCode::FAILURE;
    };

    report(run(&schema, &source, &backend))
}

fn report(result: Result<String, Box<dyn Error>>) -> ExitCode {
    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("criteria - compile typed queries to backend-native form");
    println!();
    println!("Usage: criteria --schema FILE (--query FILE | --sql TEXT | --mappings) [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -s, --schema FILE      Entity schema (JSON)");
    println!("  -q, --query FILE       Query (JSON)");
    println!("      --sql TEXT         Query as SELECT ... FROM <entity> [WHERE ...]");
    println!("  -b, --backend NAME     elasticsearch (default), memory or sql");
    println!("  -m, --mappings         Print the Elasticsearch index mappings of the schema");
    println!("  -v, --verbose          Log at debug level (RUST_LOG overrides)");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  criteria -s people.json --sql \"SELECT name FROM people WHERE age >= 18\"");
    println!("  criteria -s people.json -q adults.json -b sql");
    println!("  criteria -s people.json --mappings");
}

fn run(schema: &Path, source: &Source, backend: &str) -> Result<String, Box<dyn Error>> {
    let schema = EntitySchema::from_json_file(schema)?;
    let query: Query = match source {
        Source::File(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        Source::Sql(text) => FilterParser::parse_query(&schema, text)?,
    };

    let native = match backend {
        "elasticsearch" | "es" => explain(&ElasticsearchCompiler::new(), &query, &schema)?,
        "memory" => explain(&MemoryCompiler::new(), &query, &schema)?,
        "sql" => explain(&SqlCompiler::new(), &query, &schema)?,
        other => return Err(format!("unknown backend '{}'", other).into()),
    };
    Ok(serde_json::to_string_pretty(&native)?)
}

fn index_mappings(schema: &Path) -> Result<String, Box<dyn Error>> {
    let schema = EntitySchema::from_json_file(schema)?;
    let properties = Mappings::from_schema(&schema).to_properties();
    Ok(serde_json::to_string_pretty(&json!({ "mappings": properties }))?)
}

fn explain<C: QueryCompiler>(
    compiler: &C,
    query: &Query,
    schema: &EntitySchema,
) -> Result<serde_json::Value, Box<dyn Error>> {
    Ok(compile(compiler, query, schema)?.to_json())
}
