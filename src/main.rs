//! # Page Harness CLI (`pgh`)
//!
//! The `pgh` binary is the command-line interface for Page Harness. It
//! records pages, visits, bookmarks and tags in a local SQLite database and
//! answers full-text queries filtered by domain, tag, time and bookmark
//! status.
//!
//! ## Usage
//!
//! ```bash
//! pgh --config ./config/pgh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pgh init` | Create the SQLite database and run schema migrations |
//! | `pgh add <url>` | Add or re-add a page with title, text, visits and bookmark |
//! | `pgh add-terms <url>` | Merge more body text into an existing page |
//! | `pgh visit <url>` / `pgh unvisit <url>` | Record or remove a visit |
//! | `pgh bookmark <url>` / `pgh unbookmark <url>` | Set or clear the bookmark |
//! | `pgh tag <url> <name>` / `pgh untag <url> <name>` | Attach or detach a tag |
//! | `pgh delete` | Delete pages by URL, domain or URL pattern |
//! | `pgh get <url>` | Print a stored page as JSON |
//! | `pgh search [query]` | Full-text search with filters and pagination |
//! | `pgh suggest <prefix>` | Domain or tag completions |
//! | `pgh import <file>` | Bulk-add pages from a JSONL file |
//! | `pgh check` | Verify the postings index against the tables |
//! | `pgh stats` | Row counts and index sizes |
//!
//! ## Examples
//!
//! ```bash
//! pgh init
//! pgh add https://lorem.com/post --title "Lorem" --text "dummy text" --visit 1700000000000
//! pgh tag lorem.com/post reading
//! pgh search "dummy #reading -ipsum"
//! pgh search --domain lorem.com --bookmarks --count
//! pgh suggest lo --field domain
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use page_harness::delete::DeleteTarget;
use page_harness::{annotate, config, delete, get, ingest, logging, migrate, search, stats};
use page_harness_core::models::VisitInteraction;
use page_harness_core::{SearchQuery, SuggestField};

/// Page Harness CLI: a local full-text index of visited and bookmarked
/// web pages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pgh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pgh",
    about = "Page Harness: a local full-text index of visited and bookmarked web pages",
    version,
    long_about = "Page Harness keeps the text, visits, bookmarks and tags of web pages in a \
    local SQLite database and answers full-text queries filtered by domain, tag, time range \
    and bookmark status."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pgh.toml")]
    config: PathBuf,

    /// Log at debug level regardless of `[logging] level`.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the pages, visits, bookmarks
    /// and tags tables. Safe to run more than once.
    Init,

    /// Add a page, or re-add it with more text, visits or a bookmark.
    ///
    /// Terms from earlier adds are kept; visits, bookmark and tags already
    /// stored are left in place.
    Add {
        /// Page URL (scheme optional).
        url: String,

        /// Page title.
        #[arg(long)]
        title: Option<String>,

        /// Page body text.
        #[arg(long, conflicts_with = "text_file")]
        text: Option<String>,

        /// Read the page body from a file.
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Visit time in epoch milliseconds. Repeatable.
        #[arg(long = "visit")]
        visits: Vec<i64>,

        /// Bookmark time in epoch milliseconds.
        #[arg(long)]
        bookmark: Option<i64>,
    },

    /// Merge more body text into a page that already exists.
    AddTerms {
        url: String,

        #[arg(long, conflicts_with = "text_file")]
        text: Option<String>,

        #[arg(long)]
        text_file: Option<PathBuf>,
    },

    /// Record a visit. Creates a placeholder page for unknown URLs.
    Visit {
        url: String,

        /// Visit time in epoch milliseconds (default: now).
        #[arg(long)]
        time: Option<i64>,

        /// Time spent on the page, in milliseconds.
        #[arg(long)]
        duration: Option<i64>,

        /// Furthest scroll position, as a percentage of the page.
        #[arg(long)]
        scroll_perc: Option<f64>,
    },

    /// Remove one visit. A page left with no visits and no bookmark is
    /// deleted.
    Unvisit {
        url: String,

        /// Time of the visit to remove, in epoch milliseconds.
        #[arg(long)]
        time: i64,
    },

    /// Bookmark a page. Creates a placeholder page for unknown URLs.
    Bookmark {
        url: String,

        /// Bookmark time in epoch milliseconds (default: now).
        #[arg(long)]
        time: Option<i64>,
    },

    /// Remove a bookmark. A page left with no visits is deleted.
    Unbookmark { url: String },

    /// Attach a tag to a page.
    Tag { url: String, name: String },

    /// Detach a tag from a page.
    Untag { url: String, name: String },

    /// Delete pages with their visits, bookmark and tags.
    Delete {
        /// URLs to delete.
        urls: Vec<String>,

        /// Delete every page on this domain or hostname.
        #[arg(long)]
        domain: Option<String>,

        /// Delete every page whose normalized URL matches this regex.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Print a stored page as JSON.
    Get { url: String },

    /// Search pages.
    ///
    /// The query accepts plain words, `-word` exclusions, `#tag` and
    /// `-#tag` filters, and domain tokens such as `lorem.com` or
    /// `-lorem.com`. Results are ordered newest first, with title and URL
    /// matches boosted.
    Search {
        /// Free-text query. Omit to list every page.
        query: Option<String>,

        /// Restrict to a domain or hostname. Repeatable.
        #[arg(long = "domain")]
        domains: Vec<String>,

        /// Exclude a domain or hostname. Repeatable.
        #[arg(long = "exclude-domain")]
        exclude_domains: Vec<String>,

        /// Require one of these tags. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only pages visited or bookmarked at or after this time (epoch ms).
        #[arg(long)]
        start: Option<i64>,

        /// Only pages visited or bookmarked at or before this time (epoch ms).
        #[arg(long)]
        end: Option<i64>,

        /// Only bookmarked pages.
        #[arg(long)]
        bookmarks: bool,

        /// Number of results to skip.
        #[arg(long)]
        skip: Option<usize>,

        /// Maximum results (default: `retrieval.default_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Also report the total number of matches.
        #[arg(long)]
        count: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Suggest domains or tags starting with a prefix.
    Suggest {
        prefix: String,

        /// `domain` or `tag`.
        #[arg(long, default_value = "domain")]
        field: SuggestField,
    },

    /// Bulk-add pages from a JSONL file.
    ///
    /// Each line is `{"url", "title", "text", "visits", "bookmark", "tags"}`;
    /// only `url` is required.
    Import { file: PathBuf },

    /// Check the postings index against the page tables.
    Check,

    /// Show row counts and index sizes.
    Stats {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging, cli.verbose)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            url,
            title,
            text,
            text_file,
            visits,
            bookmark,
        } => {
            ingest::run_add(&cfg, &url, title, text, text_file.as_deref(), visits, bookmark).await?;
        }
        Commands::AddTerms {
            url,
            text,
            text_file,
        } => {
            ingest::run_add_terms(&cfg, &url, text, text_file.as_deref()).await?;
        }
        Commands::Visit {
            url,
            time,
            duration,
            scroll_perc,
        } => {
            let interaction = VisitInteraction {
                duration,
                scroll_perc,
                ..Default::default()
            };
            annotate::run_visit(&cfg, &url, time, interaction).await?;
        }
        Commands::Unvisit { url, time } => {
            annotate::run_unvisit(&cfg, &url, time).await?;
        }
        Commands::Bookmark { url, time } => {
            annotate::run_bookmark(&cfg, &url, time).await?;
        }
        Commands::Unbookmark { url } => {
            annotate::run_unbookmark(&cfg, &url).await?;
        }
        Commands::Tag { url, name } => {
            annotate::run_tag(&cfg, &url, &name).await?;
        }
        Commands::Untag { url, name } => {
            annotate::run_untag(&cfg, &url, &name).await?;
        }
        Commands::Delete {
            urls,
            domain,
            pattern,
        } => {
            let target = DeleteTarget::from_args(urls, domain, pattern)?;
            delete::run_delete(&cfg, target).await?;
        }
        Commands::Get { url } => {
            get::run_get(&cfg, &url).await?;
        }
        Commands::Search {
            query,
            domains,
            exclude_domains,
            tags,
            start,
            end,
            bookmarks,
            skip,
            limit,
            count,
            json,
        } => {
            let query = SearchQuery {
                query,
                domains,
                domains_exclude: exclude_domains,
                tags,
                start_date: start,
                end_date: end,
                show_only_bookmarks: bookmarks,
                skip,
                limit,
                get_total_count: count,
            };
            search::run_search(&cfg, query, json).await?;
        }
        Commands::Suggest { prefix, field } => {
            search::run_suggest(&cfg, &prefix, field).await?;
        }
        Commands::Import { file } => {
            ingest::run_import(&cfg, &file).await?;
        }
        Commands::Check => {
            stats::run_check(&cfg).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
    }

    Ok(())
}
