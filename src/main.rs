use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

use pull::config::Config;
use pull::feed::{self, FeedError, Opml, Rss2, Spider};

#[derive(Parser, Debug)]
#[command(name = "pull", about = "Fetch and normalize RSS/Atom feeds and OPML lists")]
struct Args {
    /// Config file (defaults to ~/.config/pull/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a feed URL and print the normalized feed as JSON
    Fetch {
        url: Url,

        /// Connection timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Parse a local RSS/Atom file and print the normalized feed as JSON
    Parse { file: PathBuf },
    /// Parse an OPML file and print its outline tree
    Opml {
        file: PathBuf,

        /// List feed subscriptions only, one per line
        #[arg(long, conflicts_with = "export")]
        feeds: bool,

        /// Re-serialize the document as OPML
        #[arg(long)]
        export: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Fetch { url, timeout } => {
            let config = load_config(args.config.as_deref())?;
            fetch(url, timeout.unwrap_or(config.timeout_secs), config.max_body_bytes).await
        }
        Command::Parse { file } => parse(&file).await,
        Command::Opml {
            file,
            feeds,
            export,
        } => opml(&file, feeds, export).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match Config::default_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };
    Config::load(&path).with_context(|| format!("Failed to load config: {}", path.display()))
}

async fn fetch(url: Url, timeout_secs: u64, max_body_bytes: usize) -> Result<()> {
    let result = Spider::new(url.clone(), timeout_secs)
        .with_max_body_bytes(max_body_bytes)
        .run()
        .await
        .context("Spider task ended without a result")?;

    eprintln!(
        "status: {}  checksum: {}  time: {:?}",
        result
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into()),
        result.checksum.as_deref().unwrap_or("-"),
        result.duration
    );

    if let Some(feed) = &result.feed {
        print_json(feed)?;
    }
    match result.error {
        None => Ok(()),
        Some(feed::FetchError::Feed(FeedError::InvalidContent(partial))) => {
            eprintln!("Warning: {url} is not RSS 2.0 (version {:?})", partial.version);
            print_json(&partial)
        }
        Some(e) => Err(e).with_context(|| format!("Failed to fetch {url}")),
    }
}

async fn parse(file: &std::path::Path) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read feed file: {}", file.display()))?;

    match feed::parse_feed(&content) {
        Ok(feed) => print_json(&feed),
        Err(FeedError::InvalidContent(partial)) => {
            eprintln!(
                "Warning: {} is not RSS 2.0 (version {:?})",
                file.display(),
                partial.version
            );
            print_json(&partial)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to parse {}", file.display())),
    }
}

async fn opml(file: &std::path::Path, feeds_only: bool, export: bool) -> Result<()> {
    let opml = feed::read_opml_file(file)
        .await
        .with_context(|| format!("Failed to parse OPML file: {}", file.display()))?;

    if export {
        print!("{}", feed::export_opml(&opml)?);
    } else if feeds_only {
        for outline in opml.feeds() {
            println!("{}\t{}", outline.display_title(), outline.xml_url);
        }
    } else {
        print_tree(&opml);
    }
    Ok(())
}

fn print_tree(opml: &Opml) {
    if !opml.head.title.is_empty() {
        println!("{}", opml.head.title);
    }
    let mut stack: Vec<_> = opml.body.outlines.iter().rev().map(|o| (o, 0)).collect();
    while let Some((outline, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        if outline.is_feed() {
            println!("{indent}- {} <{}>", outline.display_title(), outline.xml_url);
        } else {
            println!("{indent}+ {}", outline.display_title());
        }
        stack.extend(outline.outlines.iter().rev().map(|o| (o, depth + 1)));
    }
}

fn print_json(feed: &Rss2) -> Result<()> {
    let json = serde_json::to_string_pretty(feed).context("Failed to serialize feed")?;
    println!("{json}");
    Ok(())
}
