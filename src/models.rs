use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interviewing,
    Rejected,
    Hired,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Rejected,
        ApplicationStatus::Hired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Hired => "Hired",
        }
    }

    /// Tracker marker: hired rows get a check, everything else is still in play.
    pub fn match_label(&self) -> &'static str {
        match self {
            ApplicationStatus::Hired => "✅",
            _ => "🔍",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow!(
                    "Unknown status '{}'. Expected one of: applied, interviewing, rejected, hired",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub link: String,
    pub description: Option<String>,
    #[serde(default)]
    pub cover_letter_path: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub match_score: Option<u8>,
    pub deadline: Option<NaiveDate>,
}

impl JobPosting {
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// One row of the application log. Column names are the on-disk header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(rename = "Job Title")]
    pub title: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Location")]
    pub location: Option<String>,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "Cover Letter Path")]
    pub cover_letter_path: String,
    #[serde(rename = "Status")]
    pub status: ApplicationStatus,
    #[serde(rename = "Match Score")]
    pub match_score: Option<u8>,
    #[serde(rename = "Deadline")]
    pub deadline: Option<NaiveDate>,
}

impl From<&JobPosting> for ApplicationRecord {
    fn from(posting: &JobPosting) -> Self {
        Self {
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: posting.location.clone(),
            link: posting.link.clone(),
            cover_letter_path: posting.cover_letter_path.clone(),
            status: posting.status,
            match_score: posting.match_score,
            deadline: posting.deadline,
        }
    }
}

/// A posting with its match against the active resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosting {
    pub posting: JobPosting,
    pub score: u8,
    pub stars: u8,
    pub title_hits: usize,
}

pub fn parse_deadline(value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| anyhow!("Invalid deadline '{}' (expected YYYY-MM-DD): {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_case_insensitive() {
        assert_eq!("hired".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::Hired);
        assert_eq!(
            " Interviewing ".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Interviewing
        );
        assert!("pending".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_status_defaults_to_applied() {
        assert_eq!(ApplicationStatus::default(), ApplicationStatus::Applied);
        assert_eq!(JobPosting::default().status, ApplicationStatus::Applied);
        assert!(JobPosting::default().cover_letter_path.is_empty());
    }

    #[test]
    fn test_match_label() {
        assert_eq!(ApplicationStatus::Hired.match_label(), "✅");
        assert_eq!(ApplicationStatus::Rejected.match_label(), "🔍");
    }

    #[test]
    fn test_parse_deadline() {
        assert_eq!(
            parse_deadline("2025-06-30").unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30)
        );
        assert_eq!(parse_deadline("none").unwrap(), None);
        assert_eq!(parse_deadline("").unwrap(), None);
        assert!(parse_deadline("30/06/2025").is_err());
    }

    #[test]
    fn test_record_from_posting_drops_description() {
        let posting = JobPosting {
            title: "Project Manager".to_string(),
            company: "Sample Corp".to_string(),
            link: "https://example.com/1".to_string(),
            description: Some("long text".to_string()),
            match_score: Some(50),
            ..Default::default()
        };
        let record = ApplicationRecord::from(&posting);
        assert_eq!(record.title, "Project Manager");
        assert_eq!(record.match_score, Some(50));
        assert_eq!(record.status, ApplicationStatus::Applied);
    }
}
