use std::path::PathBuf;

use accel_compat::{CompatError, Registry, ResolverConfig, VERSION};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Inspect optional native extensions and their fallbacks")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Resolve capabilities and print how each one was bound
    Probe {
        #[arg(required = true)]
        names: Vec<String>,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Call one operation of a capability on a comma-separated float list
    Call {
        name: String,
        op: String,
        #[arg(long, default_value = "")]
        input: String,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Print the effective configuration as JSON
    Report {
        #[command(flatten)]
        search: SearchArgs,
    },
}

/// Extends the configuration read from the environment.
#[derive(Args, Default)]
struct SearchArgs {
    /// Extra directory to search for extensions (repeatable)
    #[arg(long = "path")]
    paths: Vec<PathBuf>,
    /// Force a stand-in for this capability (repeatable)
    #[arg(long = "disable")]
    disabled: Vec<String>,
}

impl SearchArgs {
    fn config(self) -> ResolverConfig {
        let cfg = self
            .paths
            .into_iter()
            .fold(ResolverConfig::from_env(), |cfg, p| cfg.with_search_path(p));
        self.disabled
            .into_iter()
            .fold(cfg, |cfg, name| cfg.with_disabled(name))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let cmd = Cmd::parse();
    let out = match cmd.action {
        Action::Probe { names, search } => probe(&search.config(), &names),
        Action::Call {
            name,
            op,
            input,
            search,
        } => call(&search.config(), &name, &op, &input),
        Action::Report { search } => Ok(report(&search.config())),
    }?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn probe(cfg: &ResolverConfig, names: &[String]) -> Result<Value> {
    tracing::info!(names = ?names, dirs = cfg.search_paths.len(), "probe");
    let reg = Registry::from_config(cfg);
    let mut failed = 0usize;
    let rows: Vec<Value> = names
        .iter()
        .map(|name| match reg.resolve(name) {
            Ok(_) => json!({ "name": name, "binding": reg.describe(name) }),
            Err(err) => {
                failed += 1;
                json!({ "name": name, "error": err.to_string() })
            }
        })
        .collect();
    if failed > 0 {
        eprintln!("{}", serde_json::to_string_pretty(&rows)?);
        bail!("{failed} capability(ies) failed to load");
    }
    Ok(Value::Array(rows))
}

fn call(cfg: &ResolverConfig, name: &str, op: &str, input: &str) -> Result<Value> {
    let input = parse_input(input)?;
    tracing::info!(name, op, len = input.len(), "call");
    let reg = Registry::from_config(cfg);
    let provider = reg
        .resolve(name)
        .with_context(|| format!("resolving `{name}`"))?;
    match provider.call(op, &input) {
        Ok(output) => Ok(json!({ "name": name, "op": op, "output": output })),
        Err(err @ CompatError::Unavailable { .. }) => Ok(json!({
            "name": name,
            "op": op,
            "unavailable": err.to_string()
        })),
        Err(err) => Err(err).with_context(|| format!("calling {name}.{op}")),
    }
}

fn report(cfg: &ResolverConfig) -> Value {
    let rev = option_env!("GIT_COMMIT").unwrap_or("unknown");
    json!({
        "code_rev": rev,
        "version": VERSION,
        "config": cfg,
    })
}

fn parse_input(input: &str) -> Result<Vec<f32>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("invalid number `{s}` in --input"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_input_accepts_lists_and_rejects_garbage() {
        assert_eq!(parse_input("1, 2.5,,-3").unwrap(), vec![1.0, 2.5, -3.0]);
        assert!(parse_input("").unwrap().is_empty());
        assert!(parse_input("1,x").is_err());
    }

    #[test]
    fn probe_reports_stand_in_for_missing_extension() {
        let dir = tempdir().unwrap();
        let cfg = ResolverConfig::default().with_search_path(dir.path());
        let out = probe(&cfg, &["cumesh".to_string()]).unwrap();
        assert_eq!(out[0]["name"], "cumesh");
        assert_eq!(out[0]["binding"]["origin"]["kind"], "stand-in");
    }

    #[cfg(unix)]
    #[test]
    fn probe_fails_on_corrupted_extension() {
        let dir = tempdir().unwrap();
        let file = accel_compat::native::library_file_name("cumesh");
        fs::write(dir.path().join(file), b"junk").unwrap();
        let cfg = ResolverConfig::default().with_search_path(dir.path());
        assert!(probe(&cfg, &["cumesh".to_string()]).is_err());
    }

    #[test]
    fn call_on_stand_in_reports_unavailable() {
        let cfg = ResolverConfig::default();
        let out = call(&cfg, "cumesh", "remesh", "1,2").unwrap();
        let msg = out["unavailable"].as_str().unwrap();
        assert!(msg.contains("cumesh.remesh"));
    }

    #[test]
    fn report_includes_config() {
        let cfg = ResolverConfig::default().with_disabled("cumesh");
        let out = report(&cfg);
        assert_eq!(out["config"]["disabled"][0], "cumesh");
        assert_eq!(out["version"], VERSION);
    }

    #[test]
    fn search_args_extend_config() {
        let args = SearchArgs {
            paths: vec![PathBuf::from("/opt/ext")],
            disabled: vec!["cumesh".into()],
        };
        let cfg = args.config();
        assert!(cfg.search_paths.ends_with(&[PathBuf::from("/opt/ext")]));
        assert!(cfg.disabled.contains("cumesh"));
    }
}
