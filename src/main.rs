use clap::{Parser, Subcommand};
use rambler::planner::{self, BuildOptions};
use rambler::{config, document, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rambler")]
#[command(about = "Blog compiler with incremental rebuilds")]
#[command(long_about = "\
Blog compiler with incremental rebuilds

Posts are markdown files with TOML front matter. Each build compares the
posts against the manifests left by the previous build and rewrites only the
pages whose content changed.

Site structure:

  site/
  ├── config.toml              # Site config (optional)
  ├── style.css                # Inlined into every page (optional)
  ├── posts/
  │   ├── hello.md             # +++ date = \"2022-03-05\" tags = [\"rust\"] +++
  │   └── drafts/older.md      # Walked recursively
  ├── public/                  # Generated site
  └── .rambler/                # Build and tag manifests

Generated pages:
  Home:      index.html, then page/2/index.html, page/3/index.html, ...
  Posts:     20220305/index.html
  Tags:      tag/rust/index.html, tag/rust/page/2/index.html, ...
  Feed:      feed.xml

Set RUST_LOG=info (or debug) to see per-page rewrite decisions.
Run 'rambler gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root containing config.toml and the posts directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite stale pages and delete pages that no longer exist
    Build {
        /// Rewrite every page regardless of the previous build
        #[arg(long)]
        force: bool,
    },
    /// Load posts and report problems without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build { force } => {
            println!("==> Building {}", cli.root.display());
            let build = planner::build_site(&cli.root, &BuildOptions { force })?;
            output::print_build_output(&build);
            let output_dir = build.config.output_path(&cli.root);
            if build.outcome.report.had_failures() {
                return Err(format!(
                    "build finished with failures: {}",
                    output_dir.display()
                )
                .into());
            }
            println!("==> Build complete: {}", output_dir.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let site_config = config::load_config(&cli.root)?;
            let loaded = document::load_documents(&cli.root, &site_config)?;
            output::print_check_output(&loaded);
            if loaded.warnings.is_empty() {
                println!("==> Content is valid");
            } else {
                println!("==> {} warning(s)", loaded.warnings.len());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
