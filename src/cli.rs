use std::path::PathBuf;

use clap::{Parser, Subcommand};

use storefront::loader::ListQuery;

/// Browse the storefront catalog from the terminal
#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Browse, search and filter the storefront catalog", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Page through a listing, simulating scroll-to-bottom between pages
    Browse {
        #[command(subcommand)]
        listing: Listing,
        /// Extra pages to load after the first
        #[arg(short, long, default_value_t = 0)]
        pages: u32,
    },
    /// Show a single product
    Detail {
        id: String,
    },
    /// Hot items, popular items and a sample of tags
    Sidebar,
    /// List every tag, or a random sample of them
    Tags {
        #[arg(short, long)]
        sample: Option<usize>,
    },
}

#[derive(Subcommand, Clone)]
pub enum Listing {
    /// Every pack
    All,
    /// Streams only
    Streams,
    /// Items carrying a tag
    Tag { tag: String },
    /// Free-text search
    Search { term: String },
}

impl From<Listing> for ListQuery {
    fn from(l: Listing) -> Self {
        match l {
            Listing::All => ListQuery::All,
            Listing::Streams => ListQuery::Streams,
            Listing::Tag { tag } => ListQuery::Tag(tag),
            Listing::Search { term } => ListQuery::Search(term),
        }
    }
}
