use std::fmt;
use std::io::Read as _;
use std::path::Path;

use anyhow::Context as _;

use crate::cli::ConvertArgs;
use crate::formats::{self, Book};

const USAGE: &str = "usage: readinglist convert <input.csv|-> [output.json]";

/// Canonical `Book` fields a spreadsheet column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Author,
    FirstPublished,
    Category,
    Isbn13,
    Description,
    PageCount,
    Publisher,
    Thumbnail,
    BuyLink,
}

/// Keyed by the trimmed, lowercased header text.
const HEADER_SYNONYMS: &[(&str, Field)] = &[
    ("title", Field::Title),
    ("author", Field::Author),
    ("first published", Field::FirstPublished),
    ("firstpublished", Field::FirstPublished),
    ("category", Field::Category),
    ("isbn-13", Field::Isbn13),
    ("isbn13", Field::Isbn13),
    ("isbn", Field::Isbn13),
    ("description", Field::Description),
    ("page count", Field::PageCount),
    ("pagecount", Field::PageCount),
    ("pages", Field::PageCount),
    ("publisher", Field::Publisher),
    ("image", Field::Thumbnail),
    ("thumbnail", Field::Thumbnail),
    ("buy link", Field::BuyLink),
    ("buylink", Field::BuyLink),
    ("link", Field::BuyLink),
    ("url", Field::BuyLink),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Field(Field),
    /// Unrecognized header, carried into `Book::extra` under its trimmed text.
    Passthrough(String),
    Ignored,
}

pub fn column_for_header(raw: &str) -> Column {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Column::Ignored;
    }

    let normalized = trimmed.to_lowercase();
    match HEADER_SYNONYMS
        .iter()
        .find(|(name, _)| *name == normalized.as_str())
    {
        Some((_, field)) => Column::Field(*field),
        None => Column::Passthrough(trimmed.to_owned()),
    }
}

/// A row the parser could not take as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: u64,
    pub message: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub books: Vec<Book>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Parses a spreadsheet CSV export into books, in row order.
///
/// Broken rows never fail the conversion: a row with the wrong number of
/// cells is still converted and reported, a row that cannot be decoded is
/// skipped and reported. Rows without a title are dropped silently.
pub fn normalize_csv(input: impl AsRef<[u8]>) -> Normalized {
    let mut out = Normalized::default();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input.as_ref());

    let columns: Vec<Column> = match reader.headers() {
        Ok(headers) => headers.iter().map(column_for_header).collect(),
        Err(err) => {
            out.diagnostics.push(ParseDiagnostic {
                line: err.position().map_or(1, |pos| pos.line()),
                message: format!("unreadable header row: {err}"),
            });
            return out;
        }
    };

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map_or(0, |pos| pos.line());
                let fatal = matches!(err.kind(), csv::ErrorKind::Io(_));
                out.diagnostics.push(ParseDiagnostic {
                    line,
                    message: format!("skipped row: {err}"),
                });
                if fatal {
                    break;
                }
                continue;
            }
        };

        if record.len() != columns.len() {
            out.diagnostics.push(ParseDiagnostic {
                line: record.position().map_or(0, |pos| pos.line()),
                message: format!(
                    "expected {} fields, found {}",
                    columns.len(),
                    record.len()
                ),
            });
        }

        let mut book = Book::default();
        for (idx, column) in columns.iter().enumerate() {
            let value = record.get(idx).unwrap_or("").trim();
            match column {
                Column::Field(field) => assign_field(&mut book, *field, value),
                Column::Passthrough(name) => {
                    book.extra
                        .insert(name.clone(), serde_json::Value::String(value.to_owned()));
                }
                Column::Ignored => {}
            }
        }

        if book.title.is_empty() {
            continue;
        }
        out.books.push(book);
    }

    out
}

fn assign_field(book: &mut Book, field: Field, value: &str) {
    match field {
        Field::Title => book.title = value.to_owned(),
        Field::Author => book.author = value.to_owned(),
        Field::FirstPublished => book.first_published = coerce_year(value),
        Field::Category => book.category = value.to_owned(),
        Field::Isbn13 => book.isbn13 = value.to_owned(),
        Field::Description => book.description = value.to_owned(),
        Field::PageCount => book.page_count = coerce_count(value),
        Field::Publisher => book.publisher = value.to_owned(),
        Field::Thumbnail => {
            book.thumbnail = if formats::is_http_url(value) {
                value.to_owned()
            } else {
                if !value.is_empty() {
                    tracing::debug!(value, "ignoring image cell that is not an http(s) url");
                }
                String::new()
            };
        }
        Field::BuyLink => book.buy_link = value.to_owned(),
    }
}

/// Reads the leading integer of a cell (`"350 pages"` is 350); `None` if there is none.
fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

pub fn coerce_year(value: &str) -> i32 {
    parse_leading_int(value)
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0)
}

pub fn coerce_count(value: &str) -> u32 {
    parse_leading_int(value)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn reads_stdin(input: &str) -> bool {
    input == "-" || !input.to_ascii_lowercase().ends_with(".csv")
}

pub fn run(root: &Path, args: ConvertArgs) -> anyhow::Result<()> {
    let Some(input) = args.input.as_deref() else {
        anyhow::bail!(USAGE);
    };

    // Raw bytes: a row that is not valid UTF-8 is skipped, not fatal.
    let bytes = if reads_stdin(input) {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("read csv from stdin")?;
        bytes
    } else {
        let path = crate::store::resolve_path(root, input);
        std::fs::read(&path).with_context(|| format!("read csv: {}", path.display()))?
    };

    let normalized = normalize_csv(&bytes);
    for diagnostic in &normalized.diagnostics {
        tracing::warn!(line = diagnostic.line, "{}", diagnostic.message);
    }
    tracing::info!(
        books = normalized.books.len(),
        diagnostics = normalized.diagnostics.len(),
        "converted csv"
    );

    match args.output.as_deref() {
        Some(output) => {
            let path = crate::store::resolve_path(root, output);
            crate::store::write_books(&path, &normalized.books)
                .with_context(|| format!("write json: {}", path.display()))?;
            eprintln!(
                "Wrote {} books to {}",
                normalized.books.len(),
                path.display()
            );
        }
        None => {
            let json =
                serde_json::to_string_pretty(&normalized.books).context("serialize books")?;
            println!("{json}");
        }
    }

    Ok(())
}
