// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use certgraph_rs::core::chain::{ChainProjector, ExtensionRegistry};
use certgraph_rs::core::models::Discovery;
use certgraph_rs::core::source::load_chain;
use certgraph_rs::core::store::MemoryStore;
use certgraph_rs::logging::initialize_logging;

/// Projects a TLS certificate chain into a graph of domains, organizations,
/// addresses and URLs.
#[derive(Debug, Parser)]
#[command(name = "certgraph", version, about)]
struct Args {
    /// Base domain the chain was served for.
    #[arg(short, long)]
    domain: String,

    /// Certificate files, leaf first. PEM bundles are expanded in file order.
    #[arg(short, long = "cert", value_name = "FILE", required = true, num_args = 1..)]
    certs: Vec<PathBuf>,

    /// Print the resulting graph as JSON after the discovered values.
    #[arg(long)]
    json: bool,

    /// Mirror log events to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let log_path = initialize_logging(args.verbose)?;
    info!(log = %log_path.display(), domain = %args.domain, "certgraph starting.");

    let chain = load_chain(&args.certs).await?;

    let store = MemoryStore::new();
    let registry = ExtensionRegistry::standard();
    let (tx, mut rx) = mpsc::unbounded_channel::<Discovery>();

    let printer = tokio::spawn(async move {
        while let Some(discovery) = rx.recv().await {
            match serde_json::to_string(&discovery.entity) {
                Ok(json) => println!("{}: {}", discovery.kind, json),
                Err(e) => eprintln!("{}: <unprintable entity: {}>", discovery.kind, e),
            }
        }
    });

    let projector = ChainProjector::new(&store, &registry).with_discoveries(tx);
    let outcome = projector.project_domain(&args.domain, &chain).await;
    // Dropping the projector closes the channel so the printer can finish.
    drop(projector);
    printer.await.wrap_err("discovery printer panicked")?;

    let summary = outcome.wrap_err_with(|| format!("projection for {} failed", args.domain))?;
    info!(?summary, "Projection complete.");

    if args.json {
        let graph = store.into_graph()?;
        println!("{}", serde_json::to_string_pretty(&graph)?);
    }

    Ok(())
}
