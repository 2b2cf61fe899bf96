//! External web adapters used by the gathering stage
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - Web search (DuckDuckGo via daedra)
//! - [`scrape`](crate::tools::scrape) - Page fetch and readable-text extraction
//!
//! Both adapters sit behind narrow traits ([`SearchService`], [`ScrapeService`])
//! so stages can be driven by scripted fakes in tests.
//!
//! ```ignore
//! let hits = DaedraSearch::new().search("rust async runtimes", 5).await?;
//! let page = HttpScraper::new(Duration::from_secs(10), 8_000)?
//!     .fetch(&hits[0].url)
//!     .await?;
//! println!("{} ({} words)", page.title, page.word_count);
//! ```

/// Page fetching and text extraction.
pub mod scrape;
/// Web search using DuckDuckGo.
pub mod search;

pub use scrape::{HttpScraper, ScrapeError, ScrapeService, ScrapedContent};
pub use search::{DaedraSearch, SearchHit, SearchService};
