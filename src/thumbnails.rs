use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::books_api::{self, GoogleBooks, SearchReply, VolumeSearch};
use crate::cli::ThumbnailsArgs;
use crate::formats::Book;
use crate::isbn;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Isbn13,
    Isbn10,
    TitleAuthor,
    Title,
}

/// One search the cascade will try, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub strategy: Strategy,
    pub query: String,
}

/// Fixed sleeps that keep the run under the service's rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After each book that issued a search, except the last book.
    pub delay: Duration,
    /// After a 429 answer, before the next strategy.
    pub rate_limit_cooldown: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            rate_limit_cooldown: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Builds the cascade for `book`: ISBN-13, ISBN-10, title+author, title.
pub fn lookups_for(book: &Book) -> Vec<Lookup> {
    let mut lookups = Vec::new();

    let isbn13 = isbn::normalize(&book.isbn13);
    if !isbn13.is_empty() {
        lookups.push(Lookup {
            strategy: Strategy::Isbn13,
            query: format!("isbn:{isbn13}"),
        });
        if let Some(isbn10) = isbn::isbn13_to_isbn10(&isbn13) {
            lookups.push(Lookup {
                strategy: Strategy::Isbn10,
                query: format!("isbn:{isbn10}"),
            });
        }
    }

    let title = phrase(&book.title);
    let author = phrase(&book.author);
    if !title.is_empty() {
        if !author.is_empty() {
            lookups.push(Lookup {
                strategy: Strategy::TitleAuthor,
                query: format!("intitle:\"{title}\" inauthor:\"{author}\""),
            });
        }
        lookups.push(Lookup {
            strategy: Strategy::Title,
            query: format!("intitle:\"{title}\""),
        });
    }

    lookups
}

// Quotes inside a value would end the exact-phrase filter early.
fn phrase(value: &str) -> String {
    value.replace('"', "").trim().to_owned()
}

/// Fills empty thumbnails in place, one book at a time.
pub async fn resolve_thumbnails<S>(
    books: &mut [Book],
    search: &S,
    pacing: &Pacing,
) -> ResolveSummary
where
    S: VolumeSearch + ?Sized,
{
    let total = books.len();
    let mut summary = ResolveSummary::default();

    for (idx, book) in books.iter_mut().enumerate() {
        let position = idx + 1;

        if book.has_thumbnail() {
            summary.skipped += 1;
            tracing::info!(position, total, title = %book.title, "skip: thumbnail already set");
            continue;
        }

        let lookups = lookups_for(book);
        if lookups.is_empty() {
            summary.failed += 1;
            tracing::info!(position, total, "fail: no isbn or title to search by");
            continue;
        }

        match run_cascade(&lookups, search, pacing).await {
            Some((strategy, url)) => {
                summary.updated += 1;
                tracing::info!(position, total, title = %book.title, ?strategy, %url, "updated");
                book.thumbnail = url;
            }
            None => {
                summary.failed += 1;
                tracing::info!(
                    position,
                    total,
                    title = %book.title,
                    "fail: no thumbnail found"
                );
            }
        }

        if position < total {
            tokio::time::sleep(pacing.delay).await;
        }
    }

    summary
}

async fn run_cascade<S>(
    lookups: &[Lookup],
    search: &S,
    pacing: &Pacing,
) -> Option<(Strategy, String)>
where
    S: VolumeSearch + ?Sized,
{
    for lookup in lookups {
        match search.search(&lookup.query).await {
            SearchReply::Volumes(volumes) => {
                if let Some(url) = books_api::first_image_url(&volumes) {
                    return Some((lookup.strategy, url));
                }
                tracing::debug!(query = %lookup.query, "no image in results");
            }
            SearchReply::RateLimited => {
                tracing::warn!(
                    query = %lookup.query,
                    cooldown_ms = pacing.rate_limit_cooldown.as_millis() as u64,
                    "rate limited by books api; cooling down"
                );
                tokio::time::sleep(pacing.rate_limit_cooldown).await;
            }
            SearchReply::Unavailable => {
                tracing::debug!(query = %lookup.query, "search unavailable");
            }
        }
    }
    None
}

/// Backs up `data_path`, resolves missing thumbnails, and overwrites `data_path`.
///
/// Reading or writing the data file is fatal; a failed backup is only logged.
pub async fn enrich_file<S>(
    data_path: &Path,
    backup_path: &Path,
    search: &S,
    pacing: &Pacing,
) -> anyhow::Result<ResolveSummary>
where
    S: VolumeSearch + ?Sized,
{
    let snapshot = store::read_snapshot(data_path).context("load books")?;
    tracing::info!(
        books = snapshot.books.len(),
        data = %data_path.display(),
        "loaded books"
    );

    if let Err(err) = store::write_backup(backup_path, &snapshot.raw) {
        tracing::warn!(backup = %backup_path.display(), ?err, "backup failed; continuing");
    } else {
        tracing::info!(backup = %backup_path.display(), "wrote backup");
    }

    let mut books = snapshot.books;
    let summary = resolve_thumbnails(&mut books, search, pacing).await;

    store::write_books(data_path, &books).context("save books")?;
    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "thumbnail run complete"
    );

    Ok(summary)
}

pub async fn run(root: &Path, args: ThumbnailsArgs) -> anyhow::Result<()> {
    let data_path = store::resolve_path(root, &args.data);
    let backup_path = store::resolve_path(root, &args.backup);

    let base_url = GoogleBooks::base_url_from(args.api_base_url.as_deref());
    let search = GoogleBooks::new(&base_url, args.max_results).context("init books api")?;
    let pacing = Pacing {
        delay: Duration::from_millis(args.delay_ms),
        rate_limit_cooldown: Duration::from_millis(args.rate_limit_cooldown_ms),
    };

    enrich_file(&data_path, &backup_path, &search, &pacing).await?;
    Ok(())
}
