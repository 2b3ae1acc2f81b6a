//! Client-side pagination, search and sort over the articles of a listing
//! page.
//!
//! The listing owns a fixed set of [`ArticleRecord`]s. Sorting reorders
//! them; a non-empty search query hides pagination and filters the current
//! order instead.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::dom::{DomNode, DomTree};

/// Articles shown per page.
pub const ITEMS_PER_PAGE: usize = 5;

/// One article entry of the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Text of the `.post-date` element, rewritten from the timestamp when
    /// both are present. `None` when the article has no date element.
    pub date: Option<String>,
    pub href: Option<String>,
}

/// Parse an ISO-8601 timestamp as written in `data-timestamp`. Accepts full
/// RFC 3339, a naive date-time (taken as UTC) or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    let utc = FixedOffset::east_opt(0)?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().with_timezone(&utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&utc))
}

/// Long-form date, e.g. `January 5, 2024`.
pub fn format_date(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%B %-d, %Y").to_string()
}

/// Every `article` inside `main`, in page order.
pub fn parse_articles(tree: &DomTree) -> Vec<ArticleRecord> {
    tree.root
        .find_all("main")
        .into_iter()
        .flat_map(|main| main.find_all("article"))
        .map(article_record)
        .collect()
}

fn article_record(article: &DomNode) -> ArticleRecord {
    let heading = article.find_first("h2");
    let timestamp = article.attr("data-timestamp").and_then(parse_timestamp);
    let date = article.find_by_class("post-date").map(|el| match &timestamp {
        Some(ts) => format_date(ts),
        None => el.collect_text(),
    });
    ArticleRecord {
        title: heading.map(|h| h.collect_text()).unwrap_or_default(),
        excerpt: article
            .find_first("p")
            .map(|p| p.collect_text())
            .unwrap_or_default(),
        category: article.attr("data-category").unwrap_or_default().to_string(),
        timestamp,
        date,
        href: heading
            .and_then(|h| h.find_first("a"))
            .and_then(|a| a.attr("href"))
            .map(str::to_string),
    }
}

/// Sort criterion offered by the listing's sort control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Alpha,
    Category,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Alpha => "alpha",
            Self::Category => "category",
        }
    }

    fn compare(&self, a: &ArticleRecord, b: &ArticleRecord) -> Ordering {
        match self {
            Self::Newest => by_time(a, b, true),
            Self::Oldest => by_time(a, b, false),
            Self::Alpha => by_text(&a.title, &b.title),
            Self::Category => by_text(&a.category, &b.category),
        }
    }
}

/// Undated articles sort after dated ones in either direction.
fn by_time(a: &ArticleRecord, b: &ArticleRecord, newest_first: bool) -> Ordering {
    match (&a.timestamp, &b.timestamp) {
        (Some(x), Some(y)) if newest_first => y.cmp(x),
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case- and accent-insensitive, so `Élan` sorts with the other `e`s.
/// Ties fall back to the lower-cased text.
fn by_text(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    a.chars()
        .map(fold_accent)
        .cmp(b.chars().map(fold_accent))
        .then_with(|| a.cmp(&b))
}

/// Base letter of a lower-case Latin-1 / Latin Extended-A accented letter.
fn fold_accent(c: char) -> char {
    match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "alpha" => Ok(Self::Alpha),
            "category" => Ok(Self::Category),
            other => Err(format!(
                "unknown sort order '{}' (expected newest, oldest, alpha or category)",
                other
            )),
        }
    }
}

/// State of the prev/next control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Hidden while a search is active
    pub visible: bool,
    /// `Page X of Y`, empty for a single page
    pub label: String,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

pub struct ArticleListing {
    original: Vec<ArticleRecord>,
    /// Indices into `original` in display order
    order: Vec<usize>,
    sort: SortOrder,
    current_page: usize,
    per_page: usize,
    query: Option<String>,
}

impl ArticleListing {
    /// Sorted newest first, showing page 1.
    pub fn new(articles: Vec<ArticleRecord>) -> Self {
        Self::with_page_size(articles, ITEMS_PER_PAGE)
    }

    pub fn with_page_size(articles: Vec<ArticleRecord>, per_page: usize) -> Self {
        let mut listing = Self {
            order: (0..articles.len()).collect(),
            original: articles,
            sort: SortOrder::default(),
            current_page: 1,
            per_page: per_page.max(1),
            query: None,
        };
        listing.sort(SortOrder::default());
        listing
    }

    pub fn from_tree(tree: &DomTree) -> Self {
        Self::new(parse_articles(tree))
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.order.len().div_ceil(self.per_page)
    }

    pub fn is_searching(&self) -> bool {
        self.query.is_some()
    }

    /// Show page `page` (1-based). Ignored while searching.
    pub fn show_page(&mut self, page: usize) {
        if self.is_searching() {
            return;
        }
        self.current_page = page;
    }

    pub fn next_page(&mut self) {
        if self.current_page < self.total_pages() {
            self.show_page(self.current_page + 1);
        }
    }

    pub fn prev_page(&mut self) {
        if self.current_page > 1 {
            self.show_page(self.current_page - 1);
        }
    }

    /// Filter by `query` across title, excerpt and category. An empty query
    /// leaves search mode and restores the current page.
    pub fn search(&mut self, query: &str) {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            self.query = None;
            let page = self.current_page;
            self.show_page(page);
        } else {
            self.query = Some(query);
        }
    }

    /// Reorder and go back to page 1.
    pub fn sort(&mut self, order: SortOrder) {
        let original = &self.original;
        let mut indices: Vec<usize> = (0..original.len()).collect();
        indices.sort_by(|&a, &b| order.compare(&original[a], &original[b]));
        self.order = indices;
        self.sort = order;
        self.current_page = 1;
        log::debug!("Listing sorted by {}", order);
    }

    /// Articles currently displayed, in display order.
    pub fn visible(&self) -> Vec<&ArticleRecord> {
        let ordered = self.order.iter().map(|&i| &self.original[i]);
        match &self.query {
            Some(query) => ordered.filter(|a| matches(a, query)).collect(),
            None => {
                let start = self.current_page.saturating_sub(1) * self.per_page;
                ordered.skip(start).take(self.per_page).collect()
            }
        }
    }

    pub fn pagination(&self) -> Pagination {
        let total = self.total_pages();
        let visible = !self.is_searching();
        if total > 1 {
            Pagination {
                visible,
                label: format!("Page {} of {}", self.current_page, total),
                prev_enabled: self.current_page != 1,
                next_enabled: self.current_page != total,
            }
        } else {
            Pagination {
                visible,
                label: String::new(),
                prev_enabled: false,
                next_enabled: false,
            }
        }
    }
}

fn matches(article: &ArticleRecord, query: &str) -> bool {
    article.title.to_lowercase().contains(query)
        || article.excerpt.to_lowercase().contains(query)
        || article.category.to_lowercase().contains(query)
}
