use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "imgsweep", about = "Scan a web page for images and bulk-download them")]
pub struct Cli {
    /// Page to scan
    pub url: String,

    /// Crawl depth: 0 page only, 1 consider links, 2 expand linked pages,
    /// 3 harvest their links too
    #[arg(long)]
    pub deep: Option<u8>,

    /// Inclusion pattern; only matching sources are kept
    #[arg(long)]
    pub filter: Option<String>,

    /// Bundle everything into one zip archive with this name
    #[arg(long)]
    pub zip: Option<String>,

    /// Download directory (defaults to the configured one)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Base network timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// List qualified images without downloading
    #[arg(long)]
    pub dry_run: bool,
}
