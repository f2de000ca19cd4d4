use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::models::lead::Lead;
use crate::services::extraction::{ExtractionError, Extractor, RecordError, SearchQuery};
use crate::services::progress::{self, ProgressReporter};

const MAPS_ORIGIN: &str = "https://www.google.com";
const MAPS_SEARCH_BASE: &str = "https://www.google.com/maps/search";
static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d\.\d)\s*\(([\d,]+)\)").expect("valid regex"));

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Settings for talking to the headless browser service.
#[derive(Debug, Clone)]
pub struct MapsExtractorConfig {
    /// Base URL of a Browserless-compatible service (exposes `/content`)
    pub browser_url: String,
    pub browser_token: Option<String>,
    /// Forwarded to the browser as `--proxy-server`
    pub proxy_server: Option<String>,
    pub search_timeout: Duration,
    pub place_timeout: Duration,
}

impl Default for MapsExtractorConfig {
    fn default() -> Self {
        Self {
            browser_url: "http://localhost:3001".to_string(),
            browser_token: None,
            proxy_server: None,
            search_timeout: Duration::from_secs(60),
            place_timeout: Duration::from_secs(10),
        }
    }
}

/// Extracts business listings from a map search rendered by a headless
/// browser.
pub struct MapsExtractor {
    http: reqwest::Client,
    content_endpoint: Url,
    config: MapsExtractorConfig,
}

impl MapsExtractor {
    pub fn new(config: MapsExtractorConfig) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let content_endpoint = content_endpoint(&config)?;

        Ok(Self {
            http,
            content_endpoint,
            config,
        })
    }

    /// Fetch fully rendered HTML for `url`.
    async fn render(
        &self,
        url: &str,
        timeout: Duration,
        stage: &'static str,
    ) -> Result<String, ExtractionError> {
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": "networkidle2",
                "timeout": timeout.as_millis() as u64,
            },
        });

        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ExtractionError::Timeout {
                    stage,
                    secs: timeout.as_secs(),
                }
            } else {
                ExtractionError::Http(e)
            }
        };

        let response = self
            .http
            .post(self.content_endpoint.clone())
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(to_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Unavailable(format!(
                "headless browser returned HTTP {status} for {stage}: {message}"
            )));
        }

        response.text().await.map_err(to_error)
    }

    async fn extract_place(
        &self,
        url: &str,
        category: &str,
        timeout: Duration,
    ) -> Result<Lead, RecordError> {
        let html = self
            .render(url, timeout, "place page")
            .await
            .map_err(|e| RecordError::Load(e.to_string()))?;
        parse_place(&html, url, category)
    }
}

#[async_trait]
impl Extractor for MapsExtractor {
    async fn extract(
        &self,
        query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        progress.report(progress::BROWSER_READY);

        let url = search_url(query)?;
        debug!(url = %url, "Loading map search");
        let html = self
            .render(
                url.as_str(),
                query.bounded(self.config.search_timeout),
                "search page",
            )
            .await?;
        progress.report(progress::SEARCH_LOADED);

        let candidates = parse_candidates(&html, query.limit)?;
        progress.report(progress::CANDIDATES_FOUND);
        info!(
            niche = %query.niche,
            city = %query.city,
            candidates = candidates.len(),
            "Map search returned candidates"
        );

        let mut leads = Vec::with_capacity(candidates.len());
        for (i, place_url) in candidates.iter().enumerate() {
            if query.deadline_passed() {
                warn!(
                    collected = leads.len(),
                    remaining = candidates.len() - i,
                    "Job deadline reached, returning partial results"
                );
                break;
            }

            let timeout = query.bounded(self.config.place_timeout);
            match self.extract_place(place_url, &query.niche, timeout).await {
                Ok(lead) => leads.push(lead),
                Err(e) => {
                    metrics::counter!("scrape_records_skipped_total").increment(1);
                    warn!(url = %place_url, error = %e, "Skipping listing");
                }
            }
            progress.record_processed(i + 1, candidates.len());
        }

        Ok(leads)
    }
}

fn content_endpoint(config: &MapsExtractorConfig) -> Result<Url, ExtractionError> {
    let base = config.browser_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/content")).map_err(|e| {
        ExtractionError::Unavailable(format!("invalid headless browser URL {base}: {e}"))
    })?;

    {
        let mut pairs = url.query_pairs_mut();
        if let Some(token) = &config.browser_token {
            pairs.append_pair("token", token);
        }
        if let Some(proxy) = &config.proxy_server {
            pairs.append_pair("--proxy-server", proxy);
        }
    }
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// Map search URL for a query.
pub fn search_url(query: &SearchQuery) -> Result<Url, ExtractionError> {
    let mut url = Url::parse(MAPS_SEARCH_BASE)
        .map_err(|e| ExtractionError::Unavailable(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ExtractionError::Unavailable("search URL cannot take a path".to_string()))?
        .push(&query.search_text());
    Ok(url)
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collect place links from the results feed, in page order.
///
/// A page without a results feed means the search itself did not work. A
/// feed with no places is a successful search with zero matches.
pub fn parse_candidates(html: &str, limit: usize) -> Result<Vec<String>, ExtractionError> {
    let document = Html::parse_document(html);
    let feed_sel = selector(r#"div[role="feed"]"#);
    let link_sel = selector("a[href]");

    let feed = document.select(&feed_sel).next().ok_or_else(|| {
        ExtractionError::LayoutChanged("results list did not load".to_string())
    })?;

    let mut seen = HashSet::new();
    let mut places = Vec::new();

    for link in feed.select(&link_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.contains("/maps/place/") {
            continue;
        }

        let absolute = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{MAPS_ORIGIN}{href}")
        };

        if seen.insert(absolute.clone()) {
            places.push(absolute);
        }
        if places.len() >= limit {
            break;
        }
    }

    Ok(places)
}

/// Build a lead from a rendered place page.
pub fn parse_place(html: &str, url: &str, category: &str) -> Result<Lead, RecordError> {
    let document = Html::parse_document(html);
    let heading_sel = selector("h1");
    let main_sel = selector(r#"div[role="main"]"#);
    let phone_sel = selector(r#"button[data-item-id*="phone"]"#);
    let address_sel = selector(r#"button[data-item-id*="address"]"#);

    let name = document
        .select(&heading_sel)
        .map(element_text)
        .find(|text| !text.is_empty())
        .ok_or(RecordError::Missing("business name"))?;

    let main_text = document
        .select(&main_sel)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(document.root_element()));

    let button_text = |sel: &Selector| {
        document
            .select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    };

    let mut lead = Lead::new(name, category);
    if let Some((rating, reviews)) = parse_rating(&main_text) {
        lead.rating = Some(rating);
        lead.reviews = Some(reviews);
    }
    lead.phone = button_text(&phone_sel);
    lead.address = button_text(&address_sel);
    lead.maps_url = Some(url.to_string());

    Ok(lead)
}

/// Find a rating summary such as `4.5 (1,234)` in free text.
///
/// Matches that do not fit a star rating and review count are passed over
/// in favour of later ones.
pub fn parse_rating(text: &str) -> Option<(f32, u32)> {
    RATING_RE.captures_iter(text).find_map(|caps| {
        let rating: f32 = caps[1].parse().ok()?;
        let reviews: u32 = caps[2].replace(',', "").parse().ok()?;
        (0.0..=5.0).contains(&rating).then_some((rating, reviews))
    })
}
