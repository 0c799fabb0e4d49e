use log::{debug, info, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::time::Duration;

use crate::config::{BoardConfig, JobApiCredentials};
use crate::error::SourceError;
use crate::models::JobPosting;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub location: Option<String>,
    /// e.g. FULLTIME, PARTTIME, CONTRACTOR, INTERN
    pub employment_type: Option<String>,
    pub remote_only: bool,
}

impl SearchQuery {
    /// Free text with the location folded in, the way job-search APIs expect it.
    pub fn full_text(&self) -> String {
        match self.location.as_deref().map(str::trim) {
            Some(location) if !location.is_empty() => format!("{} in {}", self.query.trim(), location),
            _ => self.query.trim().to_string(),
        }
    }
}

pub trait JobSource {
    fn fetch(&self, query: &SearchQuery) -> Result<Vec<JobPosting>, SourceError>;
    fn name(&self) -> &'static str;
}

/// Runs a search and treats every failure as "no jobs found".
pub fn search_or_empty(source: &dyn JobSource, query: &SearchQuery) -> Vec<JobPosting> {
    match source.fetch(query) {
        Ok(postings) => {
            info!("{} returned {} postings", source.name(), postings.len());
            postings
        }
        Err(e) => {
            warn!("job search failed: {}", e);
            eprintln!("Job search failed: {}", e);
            Vec::new()
        }
    }
}

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("jobagent/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}

// --- JSearch (RapidAPI) ---

#[derive(Debug, Deserialize)]
struct JSearchResponse {
    #[serde(default)]
    data: Vec<JSearchJob>,
}

#[derive(Debug, Deserialize)]
struct JSearchJob {
    job_title: Option<String>,
    employer_name: Option<String>,
    job_city: Option<String>,
    job_state: Option<String>,
    job_country: Option<String>,
    job_location: Option<String>,
    job_apply_link: Option<String>,
    job_google_link: Option<String>,
    job_description: Option<String>,
}

impl JSearchJob {
    fn location(&self) -> Option<String> {
        if let Some(location) = self.job_location.as_deref().filter(|l| !l.trim().is_empty()) {
            return Some(location.trim().to_string());
        }
        let parts: Vec<&str> = [&self.job_city, &self.job_state, &self.job_country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    fn into_posting(self) -> JobPosting {
        let location = self.location();
        JobPosting {
            title: self.job_title.unwrap_or_default().trim().to_string(),
            company: self.employer_name.unwrap_or_default().trim().to_string(),
            location,
            link: self
                .job_apply_link
                .or(self.job_google_link)
                .unwrap_or_default(),
            description: self.job_description.filter(|d| !d.trim().is_empty()),
            ..Default::default()
        }
    }
}

fn parse_jsearch_body(body: &str) -> Result<Vec<JobPosting>, SourceError> {
    let response: JSearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse {
            source_name: "JSearch",
            message: e.to_string(),
        })?;

    Ok(response
        .data
        .into_iter()
        .map(JSearchJob::into_posting)
        .filter(|p| !p.title.is_empty())
        .collect())
}

pub struct JSearchSource {
    credentials: JobApiCredentials,
    num_pages: u32,
    client: reqwest::blocking::Client,
}

impl JSearchSource {
    pub fn new(credentials: JobApiCredentials, num_pages: u32) -> Self {
        Self {
            credentials,
            num_pages: num_pages.max(1),
            client: http_client(),
        }
    }

    fn endpoint(&self) -> String {
        format!("https://{}/search", self.credentials.api_host)
    }

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", query.full_text()),
            ("page", "1".to_string()),
            ("num_pages", self.num_pages.to_string()),
        ];
        if let Some(kind) = query.employment_type.as_deref().filter(|k| !k.is_empty()) {
            params.push(("employment_types", kind.to_uppercase()));
        }
        if query.remote_only {
            params.push(("remote_jobs_only", "true".to_string()));
        }
        params
    }
}

impl JobSource for JSearchSource {
    fn fetch(&self, query: &SearchQuery) -> Result<Vec<JobPosting>, SourceError> {
        debug!("JSearch query: {:?}", query);

        let response = self
            .client
            .get(self.endpoint())
            .query(&self.params(query))
            .header("X-RapidAPI-Key", &self.credentials.api_key)
            .header("X-RapidAPI-Host", &self.credentials.api_host)
            .send()
            .map_err(|e| SourceError::Request {
                source_name: "JSearch",
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(SourceError::Transport {
                source_name: "JSearch",
                status: status.as_u16(),
                body,
            });
        }

        parse_jsearch_body(&body)
    }

    fn name(&self) -> &'static str {
        "JSearch"
    }
}

// --- HTML job board ---

struct BoardSelectors {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    link: Selector,
    description: Selector,
}

fn parse_selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse {
        source_name: "job board",
        message: format!("invalid selector '{}': {}", css, e),
    })
}

impl BoardSelectors {
    fn from_config(config: &BoardConfig) -> Result<Self, SourceError> {
        Ok(Self {
            card: parse_selector(&config.card_selector)?,
            title: parse_selector(&config.title_selector)?,
            company: parse_selector(&config.company_selector)?,
            location: parse_selector(&config.location_selector)?,
            link: parse_selector(&config.link_selector)?,
            description: parse_selector(&config.description_selector)?,
        })
    }
}

pub struct BoardScraper {
    url_template: String,
    selectors: BoardSelectors,
    whitespace: Regex,
    client: reqwest::blocking::Client,
}

impl BoardScraper {
    pub fn new(config: &BoardConfig) -> Result<Self, SourceError> {
        let url_template = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SourceError::NotConfigured("[board].url".to_string()))?;

        Ok(Self {
            url_template,
            selectors: BoardSelectors::from_config(config)?,
            whitespace: Regex::new(r"\s+").map_err(|e| SourceError::Parse {
                source_name: "job board",
                message: e.to_string(),
            })?,
            client: http_client(),
        })
    }

    fn url_for(&self, query: &SearchQuery) -> String {
        self.url_template
            .replace("{query}", &urlencoding::encode(query.query.trim()))
            .replace(
                "{location}",
                &urlencoding::encode(query.location.as_deref().unwrap_or("").trim()),
            )
    }

    fn text_of(&self, card: &ElementRef, selector: &Selector) -> Option<String> {
        card.select(selector).next().map(|el| {
            let raw = el.text().collect::<Vec<_>>().join(" ");
            self.whitespace.replace_all(raw.trim(), " ").into_owned()
        })
        .filter(|t| !t.is_empty())
    }

    pub fn parse_listing(&self, html: &str, base_url: &str) -> Vec<JobPosting> {
        let document = Html::parse_document(html);
        let mut postings = Vec::new();

        for card in document.select(&self.selectors.card) {
            let Some(title) = self.text_of(&card, &self.selectors.title) else {
                continue;
            };
            let link = card
                .select(&self.selectors.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| absolutize(base_url, href))
                .unwrap_or_default();

            postings.push(JobPosting {
                title,
                company: self
                    .text_of(&card, &self.selectors.company)
                    .unwrap_or_default(),
                location: self.text_of(&card, &self.selectors.location),
                link,
                description: self.text_of(&card, &self.selectors.description),
                ..Default::default()
            });
        }

        postings
    }
}

impl JobSource for BoardScraper {
    fn fetch(&self, query: &SearchQuery) -> Result<Vec<JobPosting>, SourceError> {
        let url = self.url_for(query);
        info!("scraping {}", url);

        let response = self.client.get(&url).send().map_err(|e| SourceError::Request {
            source_name: "job board",
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(SourceError::Transport {
                source_name: "job board",
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let mut postings = self.parse_listing(&body, &url);
        if query.remote_only {
            postings.retain(|p| {
                p.location
                    .as_deref()
                    .is_some_and(|l| l.to_lowercase().contains("remote"))
            });
        }
        Ok(postings)
    }

    fn name(&self) -> &'static str {
        "job board"
    }
}

fn absolutize(base_url: &str, href: &str) -> String {
    match reqwest::Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}
