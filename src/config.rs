use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub jobs: JobApiConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_store_path")]
    pub store: PathBuf,
    #[serde(default = "default_resume_path")]
    pub resume: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_num_pages")]
    pub num_pages: u32,
}

/// CSS selectors for scraping a job board. `url` may contain `{query}` and `{location}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub url: Option<String>,
    #[serde(default = "default_card_selector")]
    pub card_selector: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_company_selector")]
    pub company_selector: String,
    #[serde(default = "default_location_selector")]
    pub location_selector: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_description_selector")]
    pub description_selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_cover_letter_chars")]
    pub cover_letter_chars: usize,
    #[serde(default = "default_rewrite_chars")]
    pub rewrite_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub access_token: Option<String>,
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

/// Validated job-search API credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct JobApiCredentials {
    pub api_key: String,
    pub api_host: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("job_log.csv")
}

fn default_resume_path() -> PathBuf {
    PathBuf::from("resume.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_api_host() -> String {
    "jsearch.p.rapidapi.com".to_string()
}

fn default_num_pages() -> u32 {
    1
}

fn default_card_selector() -> String {
    "div.job-card".to_string()
}

fn default_title_selector() -> String {
    ".job-title".to_string()
}

fn default_company_selector() -> String {
    ".company".to_string()
}

fn default_location_selector() -> String {
    ".location".to_string()
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

fn default_description_selector() -> String {
    ".summary".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_cover_letter_chars() -> usize {
    1500
}

fn default_rewrite_chars() -> usize {
    2500
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_sheet_name() -> String {
    "Job_Application_Tracker".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store: default_store_path(),
            resume: default_resume_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for JobApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: default_api_host(),
            num_pages: default_num_pages(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            url: None,
            card_selector: default_card_selector(),
            title_selector: default_title_selector(),
            company_selector: default_company_selector(),
            location_selector: default_location_selector(),
            link_selector: default_link_selector(),
            description_selector: default_description_selector(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            cover_letter_chars: default_cover_letter_chars(),
            rewrite_chars: default_rewrite_chars(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            credentials_file: default_credentials_file(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobagent") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }

    /// Loads the config file, then applies environment overrides.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let parsed: Config = toml::from_str(&raw)
                .with_context(|| format!("Invalid config file: {}", path.display()))?;
            info!("loaded config from {}", path.display());
            parsed
        } else if explicit.is_some() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        } else {
            debug!("no config at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("JSEARCH_API_KEY") {
            self.jobs.api_key = Some(key);
        }
        if let Some(host) = non_empty("JSEARCH_API_HOST") {
            self.jobs.api_host = host;
        }
        if let Some(store) = non_empty("JOBAGENT_STORE") {
            self.paths.store = PathBuf::from(store);
        }
        if let Some(resume) = non_empty("JOBAGENT_RESUME") {
            self.paths.resume = PathBuf::from(resume);
        }
        if let Some(dir) = non_empty("JOBAGENT_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(token) = non_empty("GOOGLE_SHEETS_TOKEN") {
            self.sheets.access_token = Some(token);
        }
    }

    /// Fails fast when the job-search API is not configured.
    pub fn job_api(&self) -> Result<JobApiCredentials> {
        let api_key = self
            .jobs
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Job search API key not configured. Set JSEARCH_API_KEY or [jobs].api_key in {}",
                    Self::default_path().display()
                )
            })?;

        if self.jobs.api_host.trim().is_empty() {
            return Err(anyhow!("Job search API host is empty"));
        }

        Ok(JobApiCredentials {
            api_key,
            api_host: self.jobs.api_host.clone(),
        })
    }
}
