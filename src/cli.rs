use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gidx",
    version,
    about = "Queryable code dependency graph",
    after_help = r#"Examples:
  gidx build --repo .
  gidx blast --repo . --symbol PaymentProcessor --depth 2
  gidx blast --repo . --symbol Depends --kinds calls,contains
  gidx symbols --repo . --query Config
  gidx file --repo . --path app/router.py
  gidx diff --repo . < change.patch
  gidx serve --repo . --rules docs/rules.md
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the dependency graph once and print build statistics.
    Build {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        /// Skip the on-disk snapshot cache.
        #[arg(long)]
        no_cache: bool,
        /// Abort the build after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Blast radius for a symbol.
    Blast {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Traversal depth.
        #[arg(long, default_value_t = 1)]
        depth: usize,
        /// Comma-separated edge kinds to follow, e.g. calls,contains.
        #[arg(long, value_delimiter = ',')]
        kinds: Option<Vec<String>>,
    },
    /// Search symbols by name fragment.
    Symbols {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        query: String,
        /// Filter: all, module, class, function, method.
        #[arg(long, default_value = "all")]
        kind: String,
    },
    /// List symbols declared in a file.
    File {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        path: String,
    },
    /// Print a symbol's source text and span.
    Code {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Analyze a unified diff read from stdin.
    Diff {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },
    /// Full modification context for a symbol: code, rules, tests.
    Context {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Find tests related to symbols.
    Tests {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Match coding rules against symbols.
    Rules {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        rules: PathBuf,
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Run MCP server over stdio.
    Serve {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Markdown file of coding rules.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        /// Skip the on-disk snapshot cache.
        #[arg(long)]
        no_cache: bool,
        /// Abort builds after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}
