//! Concrete source fetchers.

mod news;
mod photos;
mod site_search;

pub use news::NewsFetcher;
pub use photos::PhotosFetcher;
pub use site_search::SiteSearchFetcher;
