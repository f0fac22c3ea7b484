use anyhow::Result;

use pinglun::config::Config;
use pinglun::crawler::{CommentRunOptions, CrawlReport, Crawler, StopReason};
use pinglun::storage::create_sqlite_repository;

fn open(config: Config) -> Result<Crawler> {
    let repo = create_sqlite_repository(&config.database.sqlite_path)?;
    Crawler::new(config, repo)
}

fn print_report(title: &str, report: &CrawlReport) {
    println!("\n{title}");
    println!("{}", "=".repeat(title.chars().count()));
    println!("Target: {}", report.target);
    println!("Pages: {}", report.pages);
    println!("Fetched: {}", report.fetched);
    println!("Stored (new): {}", report.stored);
    println!("Skipped: {}", report.skipped);
    println!("Page errors: {}", report.errors);
    if report.last_serial > 0 {
        println!("Last serial: {}", report.last_serial);
    }
    match report.stop {
        StopReason::Exhausted => println!("Stopped: source exhausted"),
        StopReason::PageCap => println!("Stopped: page cap reached"),
        StopReason::TransportError => println!("Stopped: request failed"),
        StopReason::PageError => println!("Stopped: page failed"),
    }
    if let Some(cursor) = &report.next_cursor {
        println!("Resume from: {cursor}");
    }
}

pub async fn comments(config: Config, bvid: &str, resume: Option<String>) -> Result<()> {
    let mut options = CommentRunOptions::from_config(&config.crawler);
    options.resume_offset = resume;

    let database = config.database.sqlite_path.clone();
    let crawler = open(config)?;
    let report = crawler.video_comments(bvid, &options).await?;

    print_report("Video Comment Crawl", &report);
    println!("Database: {}", database.display());
    Ok(())
}

pub async fn search(config: Config, keyword: &str, pages: u32) -> Result<()> {
    let page = config.crawler.search_page;
    let crawler = open(config)?;
    let report = crawler.search(keyword, page, pages).await?;

    print_report("Video Search", &report);
    for bvid in report.collected_ids.iter().take(10) {
        println!("  {bvid}");
    }
    Ok(())
}

pub async fn news(config: Config) -> Result<()> {
    let pages = config.crawler.news_pages;
    let crawler = open(config)?;
    let report = crawler.news(pages).await;

    print_report("News Crawl", &report);
    Ok(())
}

pub async fn article_comments(config: Config, article_id: &str) -> Result<()> {
    let pages = config.crawler.article_comment_pages;
    let crawler = open(config)?;
    let report = crawler.article_comments(article_id, pages).await;

    print_report("Article Comment Crawl", &report);
    Ok(())
}

pub async fn news_with_comments(config: Config) -> Result<()> {
    let news_pages = config.crawler.news_pages;
    let comment_pages = config.crawler.article_comment_pages;
    let crawler = open(config)?;
    let chain = crawler.news_with_comments(news_pages, comment_pages).await;

    print_report("News Crawl", &chain.news);
    println!("\nArticle Comments");
    println!("----------------");
    for report in &chain.articles {
        println!(
            "{}: {} pages, {} new comments, {} errors",
            report.target, report.pages, report.stored, report.errors
        );
    }
    println!("Total new comments: {}", chain.comments_stored());
    Ok(())
}
