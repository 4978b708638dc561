//! Catalog Tool
//!
//! Command-line access to a flat-record catalog file for development and data
//! maintenance, without the desktop UI.
//!
//! # Usage
//!
//! ```bash
//! # Summary numbers and load warnings
//! cargo run --bin catalog-tool -- stats catalog.json
//!
//! # Indented tree, three levels below a node
//! cargo run --bin catalog-tool -- tree catalog.json --node <ID> --depth 3
//!
//! # Merge a nested import file under a node (writes catalog.json back)
//! cargo run --bin catalog-tool -- import catalog.json upload.json --under <ID>
//!
//! # Nested export of one subtree
//! cargo run --bin catalog-tool -- export catalog.json --node <ID> --nested
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to override the default filter
//! (`catalog_tool=info,payanarss_core=info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use payanarss_core::{
    CatalogConfig, HierarchyIndex, ImportMode, ImportOptions, ImportResult, JsonFileSink,
    SaveScheduler, TreeEditor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Engine config file (JSON); defaults apply when absent
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print node/root/depth counts and any load warnings
    Stats {
        catalog: PathBuf,
    },
    /// Print the hierarchy as an indented tree
    Tree {
        catalog: PathBuf,
        /// Start at this node instead of the roots
        #[clap(long)]
        node: Option<String>,
        /// Levels to print below the start
        #[clap(long)]
        depth: Option<usize>,
    },
    /// Search node names, optionally inside one subtree
    Search {
        catalog: PathBuf,
        query: String,
        #[clap(long)]
        scope: Option<String>,
    },
    /// Merge a nested JSON file into the catalog
    Import {
        catalog: PathBuf,
        input: PathBuf,
        /// Attach imported roots under this node (top level when omitted)
        #[clap(long)]
        under: Option<String>,
        /// Remove the attachment point's existing children first
        #[clap(long)]
        replace: bool,
        /// Report what would happen without writing the catalog
        #[clap(long)]
        dry_run: bool,
    },
    /// Write the catalog, or one subtree, to stdout or a file
    Export {
        catalog: PathBuf,
        #[clap(long)]
        node: Option<String>,
        /// Emit the nested import shape instead of flat records
        #[clap(long)]
        nested: bool,
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_tool=info,payanarss_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::default(),
    };

    match args.cmd {
        Command::Stats { catalog } => {
            let editor = open_catalog(&catalog, config)?;
            println!("{}", serde_json::to_string_pretty(&editor.stats())?);
        }
        Command::Tree {
            catalog,
            node,
            depth,
        } => {
            let editor = open_catalog(&catalog, config)?;
            print!("{}", render_tree(editor.index(), node.as_deref(), depth)?);
        }
        Command::Search {
            catalog,
            query,
            scope,
        } => {
            let editor = open_catalog(&catalog, config)?;
            for node in editor.search(&query, scope.as_deref()) {
                println!("{}\t{}", node.id, node.name);
            }
        }
        Command::Import {
            catalog,
            input,
            under,
            replace,
            dry_run,
        } => {
            let result = run_import(&catalog, &input, under, replace, dry_run, config).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                bail!("import rejected with {} error(s)", result.errors.len());
            }
        }
        Command::Export {
            catalog,
            node,
            nested,
            output,
        } => {
            let editor = open_catalog(&catalog, config)?;
            let json = match (node.as_deref(), nested) {
                (Some(id), true) => serde_json::to_string_pretty(&editor.export_nested(id)?)?,
                (None, true) => serde_json::to_string_pretty(&editor.export_forest())?,
                (Some(id), false) => editor.export_subtree_json(id)?,
                (None, false) => editor.export_json()?,
            };
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    tracing::info!("Exported to {:?}", path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn open_catalog(path: &Path, config: CatalogConfig) -> Result<TreeEditor> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {:?}", path))?;
    let (editor, report) = TreeEditor::from_json(&json, config)?;
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!("Loaded {} records from {:?}", report.loaded, path);
    Ok(editor)
}

/// Import `input` into the catalog at `catalog_path`, saving through the same
/// write-behind path the editor uses interactively
async fn run_import(
    catalog_path: &Path,
    input: &Path,
    under: Option<String>,
    replace: bool,
    dry_run: bool,
    config: CatalogConfig,
) -> Result<ImportResult> {
    let document = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read import file {:?}", input))?;

    let mut editor = open_catalog(catalog_path, config.clone())?;
    let scheduler = (!dry_run).then(|| {
        SaveScheduler::spawn(
            Arc::new(JsonFileSink::new(catalog_path)),
            config.save_debounce(),
        )
    });
    editor.set_persistence(scheduler.as_ref().map(SaveScheduler::handle));

    let options = ImportOptions {
        attach_to: under,
        mode: if replace {
            ImportMode::ReplaceChildren
        } else {
            ImportMode::Append
        },
        large_import_threshold: config.large_import_threshold,
        ..Default::default()
    };
    let result = editor.import_json(&document, options);

    if let Some(scheduler) = scheduler {
        let stats = scheduler.shutdown().await;
        if stats.failures > 0 {
            bail!("failed to write catalog {:?}", catalog_path);
        }
    }
    Ok(result)
}

/// Indented `name  [id]` lines, two spaces per level
fn render_tree(
    index: &HierarchyIndex,
    start: Option<&str>,
    max_depth: Option<usize>,
) -> Result<String> {
    let starts = match start {
        Some(id) => match index.get(id) {
            Some(node) => vec![node],
            None => bail!("node {} not found", id),
        },
        None => index.roots(),
    };

    let mut out = String::new();
    let mut stack: Vec<_> = starts.into_iter().rev().map(|node| (node, 0usize)).collect();
    while let Some((node, depth)) = stack.pop() {
        out.push_str(&format!("{}{}  [{}]\n", "  ".repeat(depth), node.name, node.id));
        if max_depth.map_or(true, |max| depth < max) {
            stack.extend(
                index
                    .children(&node.id)
                    .into_iter()
                    .rev()
                    .map(|child| (child, depth + 1)),
            );
        }
    }
    Ok(out)
}
