use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinglun::config::Config;
use pinglun::models::CrawlMode;

mod commands;

#[derive(Parser)]
#[command(
    name = "pinglun",
    version,
    about = "Comment, search and news crawler with idempotent SQLite storage",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults plus PINGLUN_* variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Delay before every request in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Credential token file
    #[arg(long, global = true)]
    cookie: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the comment threads of a video
    Comments {
        /// Video BV id
        bvid: String,

        /// Comment ordering (latest, hot)
        #[arg(short, long)]
        mode: Option<CrawlMode>,

        /// Skip reply sub-pages
        #[arg(long, default_value = "false")]
        no_replies: bool,

        /// Reply sub-page cap per top-level comment (0 = 10)
        #[arg(long)]
        max_reply_pages: Option<u32>,

        /// Primary page cap (0 = until the cursor ends)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Continue from a previously reported offset
        #[arg(long)]
        resume: Option<String>,
    },

    /// Search videos by keyword
    Search {
        /// Search keyword
        keyword: String,

        /// First result page
        #[arg(short, long)]
        page: Option<u32>,

        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: u32,

        /// Results per page
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Crawl news listing pages
    News {
        /// Number of listing pages
        #[arg(short, long)]
        pages: Option<u32>,
    },

    /// Crawl the comment threads of an article
    ArticleComments {
        /// Article id
        article_id: String,

        /// Comment page cap
        #[arg(short, long)]
        pages: Option<u32>,
    },

    /// Crawl news pages, then the comments of every collected article
    NewsWithComments {
        /// Number of listing pages
        #[arg(long)]
        news_pages: Option<u32>,

        /// Comment page cap per article
        #[arg(long)]
        comment_pages: Option<u32>,
    },

    /// Show stored row counts
    Stats,

    /// List stored records
    Query {
        #[command(subcommand)]
        query: commands::Query,

        /// Maximum rows printed
        #[arg(short, long, default_value = "20", global = true)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    // Initialize tracing/logging
    setup_tracing(&config.logging.level, &config.logging.format, cli.verbose);
    if let Some(output) = cli.output {
        config.database.sqlite_path = output;
    }
    if let Some(delay) = cli.delay_ms {
        config.crawler.request_delay_ms = delay;
    }
    if let Some(cookie) = cli.cookie {
        config.credential.path = Some(cookie);
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(database = %config.database.sqlite_path.display(), "pinglun starting");

    match cli.command {
        Commands::Comments {
            bvid,
            mode,
            no_replies,
            max_reply_pages,
            max_pages,
            resume,
        } => {
            if let Some(mode) = mode {
                config.crawler.mode = mode;
            }
            if no_replies {
                config.crawler.with_replies = false;
            }
            if let Some(pages) = max_reply_pages {
                config.crawler.max_reply_pages = pages;
            }
            if let Some(pages) = max_pages {
                config.crawler.max_comment_pages = pages;
            }
            tracing::info!(
                bvid = %bvid,
                mode = %config.crawler.mode,
                with_replies = config.crawler.with_replies,
                resume = ?resume,
                "Starting comments command"
            );
            commands::comments(config, &bvid, resume).await?;
        }

        Commands::Search {
            keyword,
            page,
            pages,
            page_size,
        } => {
            if let Some(page) = page {
                config.crawler.search_page = page;
            }
            if let Some(size) = page_size {
                config.crawler.search_page_size = size;
            }
            tracing::info!(keyword = %keyword, pages, "Starting search command");
            commands::search(config, &keyword, pages).await?;
        }

        Commands::News { pages } => {
            if let Some(pages) = pages {
                config.crawler.news_pages = pages;
            }
            tracing::info!(pages = config.crawler.news_pages, "Starting news command");
            commands::news(config).await?;
        }

        Commands::ArticleComments { article_id, pages } => {
            if let Some(pages) = pages {
                config.crawler.article_comment_pages = pages;
            }
            tracing::info!(article_id = %article_id, "Starting article comments command");
            commands::article_comments(config, &article_id).await?;
        }

        Commands::NewsWithComments {
            news_pages,
            comment_pages,
        } => {
            if let Some(pages) = news_pages {
                config.crawler.news_pages = pages;
            }
            if let Some(pages) = comment_pages {
                config.crawler.article_comment_pages = pages;
            }
            tracing::info!("Starting news with comments command");
            commands::news_with_comments(config).await?;
        }

        Commands::Stats => commands::stats(&config)?,

        Commands::Query { query, limit } => commands::query(&config, query, limit)?,
    }

    tracing::info!("pinglun completed successfully");
    Ok(())
}

fn setup_tracing(level: &str, format: &str, verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("pinglun=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("pinglun={level},warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
