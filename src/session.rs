use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ScoredPosting;

/// Per-session secrets. Never serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub llm_api_key: Option<String>,
}

/// State carried between actions: the last search, the chosen result, and credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub query: Option<String>,
    pub results: Vec<ScoredPosting>,
    pub selected: Option<usize>,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Session {
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobagent") {
            proj_dirs.data_dir().join("session.json")
        } else {
            PathBuf::from(".jobagent-session.json")
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no session cache at {}", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session cache: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt session cache: {}. Run a new search.", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write session cache: {}", path.display()))?;
        debug!("saved session with {} results to {}", self.results.len(), path.display());
        Ok(())
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.credentials.llm_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn replace_results(&mut self, query: String, results: Vec<ScoredPosting>) {
        self.query = Some(query);
        self.results = results;
        self.selected = None;
    }

    /// Marks 1-based result `n` as selected and returns it.
    pub fn select(&mut self, n: usize) -> Result<&ScoredPosting> {
        if self.results.is_empty() {
            return Err(anyhow!("No cached search results. Run 'jobagent search' first."));
        }
        if n == 0 || n > self.results.len() {
            return Err(anyhow!(
                "Result #{} does not exist (last search returned {})",
                n,
                self.results.len()
            ));
        }
        self.selected = Some(n - 1);
        Ok(&self.results[n - 1])
    }

    pub fn selected(&self) -> Option<&ScoredPosting> {
        self.selected.and_then(|i| self.results.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobPosting;
    use tempfile::tempdir;

    fn scored(title: &str) -> ScoredPosting {
        ScoredPosting {
            posting: JobPosting {
                title: title.to_string(),
                company: "Acme".to_string(),
                link: "https://jobs.example.com".to_string(),
                ..Default::default()
            },
            score: 50,
            stars: 3,
            title_hits: 1,
        }
    }

    #[test]
    fn test_missing_cache_is_empty_session() {
        let dir = tempdir().unwrap();
        let session = Session::load(&dir.path().join("session.json")).unwrap();
        assert!(session.results.is_empty());
        assert!(session.selected().is_none());
    }

    #[test]
    fn test_save_load_keeps_results_not_credentials() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state/session.json");

        let mut session = Session::default().with_api_key(Some("sk-secret".to_string()));
        session.replace_results("pm".to_string(), vec![scored("a"), scored("b")]);
        session.select(2).unwrap();
        session.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("sk-secret"));

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.results.len(), 2);
        assert_eq!(loaded.selected().unwrap().posting.title, "b");
        assert_eq!(loaded.query.as_deref(), Some("pm"));
        assert!(loaded.credentials.llm_api_key.is_none());
    }

    #[test]
    fn test_select_bounds() {
        let mut session = Session::default();
        assert!(session.select(1).is_err());

        session.replace_results("q".to_string(), vec![scored("only")]);
        assert!(session.select(0).is_err());
        assert!(session.select(2).is_err());
        assert_eq!(session.select(1).unwrap().posting.title, "only");
    }

    #[test]
    fn test_new_search_clears_selection() {
        let mut session = Session::default();
        session.replace_results("q".to_string(), vec![scored("a")]);
        session.select(1).unwrap();
        session.replace_results("q2".to_string(), vec![scored("b")]);
        assert!(session.selected.is_none());
    }

    #[test]
    fn test_blank_api_key_ignored() {
        let session = Session::default().with_api_key(Some("  ".to_string()));
        assert!(session.credentials.llm_api_key.is_none());
    }

    #[test]
    fn test_corrupt_cache_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Session::load(&path).is_err());
    }
}
