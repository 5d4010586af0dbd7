use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Project root that relative data and output paths resolve against.
    #[arg(long, global = true, default_value = ".")]
    pub root: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a spreadsheet CSV export into the reading list JSON.
    Convert(ConvertArgs),
    /// Fill in missing cover thumbnails from the books search service.
    Thumbnails(ThumbnailsArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input CSV file. `-` or any name not ending in `.csv` reads stdin.
    pub input: Option<String>,

    /// Output JSON file (default: stdout).
    pub output: Option<String>,
}

#[derive(Debug, Args)]
pub struct ThumbnailsArgs {
    /// Reading list JSON to enrich in place.
    #[arg(long, default_value = "src/data/books.json")]
    pub data: String,

    /// Snapshot of the data file taken before it is overwritten.
    #[arg(long, default_value = "src/data/books.backup.json")]
    pub backup: String,

    /// Volumes search endpoint (default: $READINGLIST_BOOKS_API_URL or Google Books).
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Result count requested per search.
    #[arg(long, default_value_t = 5)]
    pub max_results: u32,

    /// Delay after each looked-up book (politeness).
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Extra wait after the service answers 429 Too Many Requests.
    #[arg(long, default_value_t = 5000)]
    pub rate_limit_cooldown_ms: u64,
}
