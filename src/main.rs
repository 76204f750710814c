mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use storefront::config::Config;
use storefront::loader::{ListQuery, LoadOutcome};
use storefront::normalize::ListItem;
use storefront::scroll::ScrollMetrics;
use storefront::sidebar::sample_tags;
use storefront::view::{render_item, render_text, ViewState};
use storefront::Storefront;

// Rough row height used to fake viewport geometry when paging from the terminal.
const ROW_PX: f64 = 40.0;
const VIEWPORT_PX: f64 = 800.0;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("STOREFRONT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("storefront=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let store = Storefront::new(config)?;

    match cli.command {
        Commands::Browse { listing, pages } => {
            let query: ListQuery = listing.into();
            let loader = store.loader_for(&query);
            // A missing term is reflected in the snapshot; rendering handles it.
            let _ = loader.start_query(query.clone()).await;
            for _ in 0..pages {
                let rows = loader.snapshot().items.len() as f64;
                let metrics = ScrollMetrics::at_end(VIEWPORT_PX, rows * ROW_PX);
                if loader.on_scroll_proximity(metrics, store.scroll_threshold()).await == LoadOutcome::Skipped {
                    break;
                }
            }
            let snapshot = loader.snapshot();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render_text(&query.title(), &ViewState::from_snapshot(snapshot)));
            }
        }
        Commands::Detail { id } => match store.product_detail(&id).await {
            Ok(item) => print_detail(&item, cli.json)?,
            Err(e) => {
                eprintln!("Error: {}", e.user_message());
                std::process::exit(1);
            }
        },
        Commands::Sidebar => {
            let data = store.sidebar().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("Hot");
                for item in &data.hot { println!("  {}", render_item(item)); }
                println!("Popular");
                for item in &data.popular { println!("  {}", render_item(item)); }
                println!("Tags: {}", data.tags.join(", "));
                for (section, msg) in &data.errors { eprintln!("{:?} unavailable: {}", section, msg); }
            }
        }
        Commands::Tags { sample } => {
            let tags = match store.tags().await {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error: {}", e.user_message());
                    std::process::exit(1);
                }
            };
            let tags = match sample {
                Some(n) => sample_tags(&tags, n, &mut rand::thread_rng()),
                None => tags,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else {
                for t in tags { println!("{}", t); }
            }
        }
    }
    Ok(())
}

fn print_detail(item: &ListItem, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(item)?);
        return Ok(());
    }
    println!("{}", render_item(item));
    println!("{}", item.description);
    if !item.image_url.is_empty() { println!("Image: {}", item.image_url); }
    if let Some(embed) = item.embed_url() { println!("Video: {}", embed); }
    if let Some(link) = &item.external_link { println!("Link: {}", link); }
    Ok(())
}
