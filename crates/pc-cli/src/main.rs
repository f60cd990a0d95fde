//! Proxy Conditions CLI
//!
//! CLI tool for matching URLs against condition lists and compiling them
//! into PAC scripts.

mod input;

use std::fs;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;

use pc_compiler::{
    build_predicate, build_script, check_conditions, format_condition_list, optimize_conditions,
    render,
};
use pc_core::domain::wildcard_for_url;
use pc_core::{Condition, ConditionKind, Request};

use input::ConditionSource;

#[derive(Parser)]
#[command(name = "pc-cli")]
#[command(about = "Proxy condition matcher and PAC compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which conditions match a URL
    Match {
        /// URL to test
        url: String,

        #[command(flatten)]
        source: ConditionSource,

        /// Local time to match at, as "YYYY-MM-DD HH:MM" (default: now)
        #[arg(long)]
        at: Option<String>,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Compile conditions into a PAC predicate or script
    Compile {
        #[command(flatten)]
        source: ConditionSource,

        /// Emit a complete FindProxyForURL script returning this proxy
        #[arg(short, long)]
        proxy: Option<String>,

        /// Drop disabled and duplicate conditions first
        #[arg(long)]
        optimize: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print conditions in canonical text form
    Normalize {
        #[command(flatten)]
        source: ConditionSource,

        /// Drop disabled and duplicate conditions first
        #[arg(long)]
        optimize: bool,

        /// Print a JSON document instead of list text
        #[arg(long)]
        json: bool,
    },

    /// Report invalid conditions and conditions that never match
    Check {
        #[command(flatten)]
        source: ConditionSource,
    },

    /// Suggest a host wildcard condition covering a URL's site
    Suggest {
        /// URL to cover
        url: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match {
            url,
            source,
            at,
            json,
        } => cmd_match(&url, &source, at.as_deref(), json),
        Commands::Compile {
            source,
            proxy,
            optimize,
            output,
        } => cmd_compile(&source, proxy.as_deref(), optimize, output.as_deref()),
        Commands::Normalize {
            source,
            optimize,
            json,
        } => cmd_normalize(&source, optimize, json),
        Commands::Check { source } => cmd_check(&source),
        Commands::Suggest { url } => cmd_suggest(&url),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[derive(Serialize)]
struct MatchReport<'a> {
    request: &'a Request,
    at: String,
    matched: Vec<MatchedCondition>,
}

#[derive(Serialize)]
struct MatchedCondition {
    index: usize,
    condition: String,
}

fn parse_time(at: Option<&str>) -> Result<NaiveDateTime, String> {
    match at {
        Some(text) => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
            .map_err(|e| format!("Invalid time '{}': {}", text, e)),
        None => Ok(Local::now().naive_local()),
    }
}

fn cmd_match(url: &str, source: &ConditionSource, at: Option<&str>, json: bool) -> Result<(), String> {
    let conditions = source.load()?;
    let request = Request::from_url(url).map_err(|e| e.to_string())?;
    let now = parse_time(at)?;

    let mut matched = Vec::new();
    for (index, condition) in conditions.iter().enumerate() {
        match condition.matches_at(&request, now) {
            Ok(true) => matched.push(MatchedCondition {
                index: index + 1,
                condition: condition.to_string(),
            }),
            Ok(false) => {}
            Err(e) => log::warn!("skipping #{} '{}': {}", index + 1, condition, e),
        }
    }

    if json {
        let report = MatchReport {
            request: &request,
            at: now.format("%Y-%m-%d %H:%M").to_string(),
            matched,
        };
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to encode report: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Request: {} (host {}, scheme {})", request.url, request.host, request.scheme);
    if matched.is_empty() {
        println!("  No matching conditions ({} checked)", conditions.len());
    } else {
        for m in &matched {
            println!("  #{:<4} {}", m.index, m.condition);
        }
    }
    Ok(())
}

fn cmd_compile(
    source: &ConditionSource,
    proxy: Option<&str>,
    optimize: bool,
    output: Option<&str>,
) -> Result<(), String> {
    let start = Instant::now();
    let mut conditions = source.load()?;
    if optimize {
        let stats = optimize_conditions(&mut conditions);
        log::info!("conditions: {} -> {}", stats.before, stats.after);
    }

    let text = match proxy {
        Some(proxy) => build_script(&conditions, proxy),
        None => build_predicate(&conditions).map(|node| render(&node) + "\n"),
    }
    .map_err(|e| format!("Compilation failed: {}", e))?;

    match output {
        Some(path) => {
            fs::write(path, &text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!(
                "Compiled {} conditions to '{}' in {:.1}ms",
                conditions.len(),
                path,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_normalize(source: &ConditionSource, optimize: bool, json: bool) -> Result<(), String> {
    let mut conditions = source.load()?;
    if optimize {
        optimize_conditions(&mut conditions);
    }

    if json {
        let text = serde_json::to_string_pretty(&conditions)
            .map_err(|e| format!("Failed to encode conditions: {}", e))?;
        println!("{}", text);
    } else {
        print!("{}", format_condition_list(&conditions));
    }
    Ok(())
}

fn cmd_check(source: &ConditionSource) -> Result<(), String> {
    let conditions: Vec<Condition> = source.load()?;
    let problems = check_conditions(&conditions);

    if problems.is_empty() {
        println!("{} conditions, no problems found", conditions.len());
        return Ok(());
    }

    for problem in &problems {
        println!("  {}", problem);
    }
    Err(format!(
        "{} of {} conditions have problems",
        problems.len(),
        conditions.len()
    ))
}

fn cmd_suggest(url: &str) -> Result<(), String> {
    let pattern = wildcard_for_url(url).ok_or_else(|| format!("No host in '{}'", url))?;
    let condition = Condition::new(ConditionKind::HostWildcard { pattern });
    println!("{}", condition);
    Ok(())
}
