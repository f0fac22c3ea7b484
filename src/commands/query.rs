use anyhow::Result;
use clap::Subcommand;

use pinglun::config::Config;
use pinglun::models::CommentSource;
use pinglun::storage::{RecordRepository, SqliteRecordRepository};
use pinglun::utils::format_db_time;

#[derive(Subcommand)]
pub enum Query {
    /// Stored news ids
    News,

    /// Stored comments of a video (BV id) or article
    Comments {
        /// Video BV id or article id
        target: String,

        /// Comment stream (video, article)
        #[arg(long, default_value = "video")]
        source: String,
    },

    /// Stored search results of a keyword
    Videos {
        /// Search keyword
        keyword: String,
    },
}

fn open_existing(config: &Config) -> Result<Option<SqliteRecordRepository>> {
    let database = &config.database.sqlite_path;
    if !database.exists() {
        println!("Database not found: {}", database.display());
        println!("Run a crawl first to create the database.");
        return Ok(None);
    }
    SqliteRecordRepository::new(database).map(Some)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

pub fn stats(config: &Config) -> Result<()> {
    let Some(repo) = open_existing(config)? else {
        return Ok(());
    };
    let counts = repo.counts()?;

    println!("Store Statistics");
    println!("================");
    println!("Database: {}", config.database.sqlite_path.display());
    println!();
    println!("Video comments:   {}", counts.video_comments);
    println!("Article comments: {}", counts.article_comments);
    println!("Search results:   {}", counts.videos);
    println!("News items:       {}", counts.news);
    println!("Total records:    {}", counts.total());

    Ok(())
}

pub fn query(config: &Config, query: Query, limit: usize) -> Result<()> {
    let Some(repo) = open_existing(config)? else {
        return Ok(());
    };

    match query {
        Query::News => {
            let ids = repo.news_ids()?;
            println!("{} news items", ids.len());
            for sid in ids.iter().take(limit) {
                println!("  {sid}");
            }
        }

        Query::Comments { target, source } => {
            let source = match source.to_ascii_lowercase().as_str() {
                "video" => CommentSource::Video,
                "article" => CommentSource::Article,
                other => anyhow::bail!("Unknown comment source: {other}. Valid: video, article"),
            };
            let comments = repo.comments_for(source, &target)?;
            println!("{} comments for {target}", comments.len());
            for c in comments.iter().take(limit) {
                let indent = if c.is_top_level() { "" } else { "    " };
                println!(
                    "{indent}#{} [{}] {} ({} likes, {}): {}",
                    c.serial,
                    c.id,
                    c.author.name,
                    c.like_count,
                    format_db_time(&c.created_at),
                    truncate(&c.content, 60)
                );
            }
        }

        Query::Videos { keyword } => {
            let videos = repo.videos_for(&keyword)?;
            println!("{} videos for {keyword}", videos.len());
            for v in videos.iter().take(limit) {
                println!(
                    "  {} {} by {} ({} plays)",
                    v.bvid,
                    truncate(&v.title, 40),
                    v.author,
                    v.play
                );
            }
        }
    }

    Ok(())
}
