use anyhow::Result;
use clap::Parser;
use gidx::indexer::BuildOptions;
use gidx::model::{EdgeKind, SymbolKind};
use gidx::service::Service;
use gidx::{cli, mcp};
use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Build {
            repo,
            no_ignore,
            no_cache,
            timeout_secs,
        } => {
            let mut service = Service::with_options(
                repo,
                BuildOptions {
                    no_ignore,
                    use_cache: !no_cache,
                    timeout: timeout_secs.map(Duration::from_secs),
                },
            );
            let stats = service.init_project(None, None)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        cli::Command::Blast {
            repo,
            symbol,
            depth,
            kinds,
        } => {
            let service = built(repo)?;
            let kinds = parse_kinds(kinds.as_deref())?;
            let blast = service.query_blast_radius(&symbol, Some(depth), kinds.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&blast)?);
            Ok(())
        }
        cli::Command::Symbols { repo, query, kind } => {
            let service = built(repo)?;
            let kind = match kind.as_str() {
                "all" => None,
                value => Some(SymbolKind::from_str(value).map_err(|e| anyhow::anyhow!(e))?),
            };
            let found = service.find_symbols(&query, kind)?;
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(())
        }
        cli::Command::File { repo, path } => {
            let service = built(repo)?;
            let symbols = service.get_file_symbols(&path)?;
            println!("{}", serde_json::to_string_pretty(&symbols)?);
            Ok(())
        }
        cli::Command::Code { repo, symbol } => {
            let service = built(repo)?;
            let code = service.get_symbol_code(&symbol)?;
            println!("{}", serde_json::to_string_pretty(&code)?);
            Ok(())
        }
        cli::Command::Diff { repo, depth } => {
            let service = built(repo)?;
            let mut diff = String::new();
            std::io::stdin().read_to_string(&mut diff)?;
            let impact = service.analyze_diff(&diff, Some(depth))?;
            println!("{}", serde_json::to_string_pretty(&impact)?);
            Ok(())
        }
        cli::Command::Context {
            repo,
            symbol,
            rules,
        } => {
            let mut service = Service::new(repo);
            service.init_project(None, rules)?;
            let context = service.get_full_context(&symbol, true)?;
            println!("{}", serde_json::to_string_pretty(&context)?);
            Ok(())
        }
        cli::Command::Tests { repo, symbols } => {
            let service = built(repo)?;
            let tests = service.get_related_tests(&symbols, &[])?;
            println!("{}", serde_json::to_string_pretty(&tests)?);
            Ok(())
        }
        cli::Command::Rules {
            repo,
            rules,
            symbols,
        } => {
            let mut service = Service::new(repo);
            service.load_rules(&rules)?;
            let matched = service.match_coding_rules(&symbols, &[]);
            println!("{}", serde_json::to_string_pretty(&matched)?);
            Ok(())
        }
        cli::Command::Serve {
            repo,
            rules,
            no_ignore,
            no_cache,
            timeout_secs,
        } => mcp::serve(
            repo,
            rules,
            BuildOptions {
                no_ignore,
                use_cache: !no_cache,
                timeout: timeout_secs.map(Duration::from_secs),
            },
        ),
    }
}

/// Query subcommands reuse the snapshot cache `gidx build` maintains, so
/// repeated queries against an unchanged tree skip the reparse.
fn built(repo: PathBuf) -> Result<Service> {
    let mut service = Service::with_options(
        repo,
        BuildOptions {
            use_cache: true,
            ..Default::default()
        },
    );
    service.init_project(None, None)?;
    Ok(service)
}

fn parse_kinds(raw: Option<&[String]>) -> Result<Option<HashSet<EdgeKind>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut kinds = HashSet::new();
    for value in raw {
        kinds.insert(EdgeKind::from_str(value).map_err(|e| anyhow::anyhow!(e))?);
    }
    Ok(if kinds.is_empty() { None } else { Some(kinds) })
}
