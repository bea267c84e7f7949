//! routefilter CLI: driving adapter for the backend-selection filters.
//!
//! Subcommands:
//! - `eval <config> --backend <locality>:<name>... [--matcher <selector>...] [--explain]`
//!   decide include/skip for each backend
//! - `check <config>` - validate config loads without errors
//! - `parse <pattern>` - print the literal rule set of a routing pattern
//!
//! Set `RUST_LOG=routefilter=debug` to see filter decisions as they happen.

use std::process;

use routefilter::prelude::*;
use routefilter::FilterConfig;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "eval" => cmd_eval(&args[2..]),
        "check" => cmd_check(&args[2..]),
        "parse" => cmd_parse(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_eval(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("eval requires a config file path".into());
    }

    let config_path = &args[0];
    let eval_args = parse_eval_args(&args[1..])?;
    if eval_args.backends.is_empty() {
        return Err("eval requires at least one --backend".into());
    }

    let filter = load_config(config_path)?
        .build()
        .map_err(|e| format!("config invalid: {e}"))?;
    tracing::debug!(?filter, matchers = eval_args.query.matchers().len(), "evaluating");

    for backend in &eval_args.backends {
        if eval_args.explain {
            let trace = filter.allows_with_trace(&eval_args.query, backend);
            println!("{backend}\t{trace}");
        } else {
            let verdict = if filter.allows(&eval_args.query, backend) {
                "include"
            } else {
                "skip"
            };
            println!("{backend}\t{verdict}");
        }
    }

    Ok(())
}

fn cmd_check(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("check requires a config file path".into());
    }

    load_config(&args[0])?
        .build()
        .map_err(|e| format!("config invalid: {e}"))?;

    println!("Config valid");
    Ok(())
}

fn cmd_parse(args: &[String]) -> Result<(), String> {
    let [pattern] = args else {
        return Err("parse requires exactly one pattern".into());
    };

    println!("{}", LiteralSet::parse(pattern));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(path: &str) -> Result<FilterConfig, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;

    let is_json = std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        FilterConfig::from_json(&content)
    } else {
        // Default to YAML (handles .yaml and .yml)
        FilterConfig::from_yaml(&content)
    };
    config.map_err(|e| e.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct EvalArgs {
    query: FetchQuery,
    backends: Vec<BackendDescriptor>,
    explain: bool,
}

fn parse_eval_args(args: &[String]) -> Result<EvalArgs, String> {
    let mut out = EvalArgs::default();
    let mut matchers = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--explain" => {
                out.explain = true;
                i += 1;
            }
            flag @ ("--backend" | "--matcher") => {
                i += 1;
                let start = i;
                while i < args.len() && !args[i].starts_with("--") {
                    let value = &args[i];
                    if flag == "--backend" {
                        let backend: BackendDescriptor =
                            value.parse().map_err(|e| format!("{flag}: {e}"))?;
                        out.backends.push(backend);
                    } else {
                        let matcher: TagMatcher =
                            value.parse().map_err(|e| format!("{flag}: {e}"))?;
                        matchers.push(matcher);
                    }
                    i += 1;
                }
                if i == start {
                    return Err(format!("{flag} requires at least one value"));
                }
            }
            other => return Err(format!("unexpected argument \"{other}\"")),
        }
    }

    out.query = FetchQuery::from(matchers);
    Ok(out)
}

fn print_usage() {
    eprintln!(
        "Usage: routefilter <command> [options]

Commands:
  eval <config> --backend <locality>:<name>... [--matcher <selector>...] [--explain]
                                  Decide include/skip for each backend
  check <config>                  Validate config
  parse <pattern>                 Print the literal rule set of a routing pattern
  help                            Show this help

Selectors use PromQL syntax, e.g. '__storage_name__=~\"shard-a|shard-b-.*\"'"
    );
}
