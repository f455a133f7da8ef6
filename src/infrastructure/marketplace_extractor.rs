//! Listing extractor for the public marketplace search pages
//!
//! One search page is `{base}{term-slug}_Desde_{offset}_NoIndex_True`, where
//! `offset = (page - 1) * results_per_page + 1`.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::errors::ExtractorError;
use crate::domain::extractor::ListingExtractor;
use crate::domain::product::RawListing;
use crate::infrastructure::config::ScrapingConfig;
use crate::infrastructure::http_client::HttpClient;

const ITEM_SELECTOR: &str = "li.ui-search-layout__item";
const TITLE_SELECTOR: &str = "a.poly-component__title";
const PRICE_SELECTOR: &str = "span.andes-money-amount.andes-money-amount--cents-superscript";
const SELLER_SELECTOR: &str = "span.poly-component__seller";
const REVIEWS_SELECTOR: &str = "span.andes-visually-hidden";
const IMAGE_SELECTOR: &str = "img.poly-component__picture";

/// Compiled selectors for one listing page
pub struct ListingPageParser {
    item: Selector,
    title: Selector,
    price: Selector,
    seller: Selector,
    reviews: Selector,
    image: Selector,
}

impl ListingPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            item: compile(ITEM_SELECTOR)?,
            title: compile(TITLE_SELECTOR)?,
            price: compile(PRICE_SELECTOR)?,
            seller: compile(SELLER_SELECTOR)?,
            reviews: compile(REVIEWS_SELECTOR)?,
            image: compile(IMAGE_SELECTOR)?,
        })
    }

    /// Extracts every listing item. A page without items yields an empty vec.
    pub fn parse(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        document
            .select(&self.item)
            .map(|item| RawListing {
                title: first_text(&item, &self.title),
                price: first_text(&item, &self.price),
                seller: first_text(&item, &self.seller),
                reviews: first_text(&item, &self.reviews),
                image_url: item
                    .select(&self.image)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(str::to_string),
            })
            .collect()
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Failed to compile selector '{}': {}", selector, e))
}

/// Stripped text pieces of the first match, concatenated
fn first_text(item: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector).next().map(|element| {
        element
            .text()
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join("")
    })
}

/// Builds search page URLs for one marketplace site
#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    base_url: Url,
    results_per_page: u32,
    whitespace: Regex,
}

impl SearchUrlBuilder {
    pub fn new(base_url: &str, results_per_page: u32) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| anyhow!("Invalid base url '{}': {}", base_url, e))?;
        Ok(Self {
            base_url,
            results_per_page,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn offset(&self, page: u32) -> u32 {
        page.saturating_sub(1)
            .saturating_mul(self.results_per_page)
            .saturating_add(1)
    }

    /// The term becomes a single percent-encoded path segment, so reserved
    /// characters (`#`, `?`, `/`) cannot swallow the page offset.
    pub fn page_url(&self, term: &str, page: u32) -> Result<Url, ExtractorError> {
        let slug = self.whitespace.replace_all(term.trim(), "-");
        let segment = format!("{slug}_Desde_{}_NoIndex_True", self.offset(page));

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ExtractorError::Parse(format!(
                    "Cannot build url for '{term}' page {page}: base url cannot hold a path"
                ))
            })?
            .pop_if_empty()
            .push(&segment);
        Ok(url)
    }
}

/// `ListingExtractor` backed by the rate-limited HTTP client
pub struct MarketplaceExtractor {
    http: Arc<HttpClient>,
    urls: SearchUrlBuilder,
    parser: ListingPageParser,
}

impl MarketplaceExtractor {
    pub fn new(http: Arc<HttpClient>, config: &ScrapingConfig) -> Result<Self> {
        Ok(Self {
            http,
            urls: SearchUrlBuilder::new(&config.base_url, config.results_per_page)?,
            parser: ListingPageParser::new()?,
        })
    }
}

#[async_trait]
impl ListingExtractor for MarketplaceExtractor {
    async fn fetch(&self, term: &str, page: u32) -> Result<Vec<RawListing>, ExtractorError> {
        let url = self.urls.page_url(term, page)?;
        let body = self.http.get_text(url.as_str()).await?;

        let listings = self.parser.parse(&body);
        if listings.is_empty() {
            tracing::debug!(term, page, "No listing items on page");
        } else {
            tracing::debug!(term, page, count = listings.len(), "Parsed listing items");
        }
        Ok(listings)
    }
}
