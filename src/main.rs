mod ai;
mod config;
mod document;
mod error;
mod export;
mod matcher;
mod models;
mod session;
mod source;
mod store;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};

use config::Config;
use export::{CsvExport, ExportTarget, SheetsExport};
use models::{parse_deadline, ApplicationRecord, ApplicationStatus};
use session::Session;
use source::{BoardScraper, JSearchSource, JobSource, SearchQuery};
use store::ApplicationStore;

#[derive(Parser)]
#[command(name = "jobagent")]
#[command(about = "Job search assistant - find, match, apply, and track")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Application log (CSV) to use instead of the configured one
    #[arg(long, value_name = "FILE", global = true)]
    store: Option<PathBuf>,

    /// Sets the logger's verbosity level
    #[arg(short, long, value_name = "VERBOSITY", default_value_t = LevelFilter::Warn, global = true)]
    verbosity: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    /// JSearch REST API
    Api,
    /// Configured HTML job board
    Board,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for jobs and rank them against your resume
    Search {
        /// Free-text query, e.g. "project manager"
        query: String,

        #[arg(short, long)]
        location: Option<String>,

        /// FULLTIME, PARTTIME, CONTRACTOR or INTERN
        #[arg(short, long)]
        employment_type: Option<String>,

        /// Only remote positions
        #[arg(long)]
        remote: bool,

        #[arg(long, value_enum, default_value = "api")]
        source: SourceKind,

        /// Resume file (txt, pdf, docx)
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Number of results to keep
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show a result from the last search
    Show {
        /// Result number from the last search
        n: usize,
    },

    /// Score a resume against a job description
    Match {
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// File holding the job description
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        job_file: Option<PathBuf>,

        /// Job description text
        #[arg(long)]
        text: Option<String>,
    },

    /// Draft a cover letter for a search result and log the application
    CoverLetter {
        /// Result number from the last search
        n: usize,

        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Model: gpt-3.5-turbo, gpt-4o, gpt-4o-mini, sonnet, haiku
        #[arg(short, long)]
        model: Option<String>,

        /// LLM API key for this run (never stored)
        #[arg(long)]
        api_key: Option<String>,

        /// Do not append the application to the log
        #[arg(long)]
        no_log: bool,
    },

    /// Rewrite your resume for a search result and save it as DOCX
    RewriteResume {
        /// Result number from the last search
        n: usize,

        #[arg(short, long)]
        resume: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Log a search result as an application without generating anything
    Log {
        /// Result number from the last search
        n: usize,

        /// Application deadline (YYYY-MM-DD)
        #[arg(short, long)]
        deadline: Option<String>,
    },

    /// Manage the application log
    Tracker {
        #[command(subcommand)]
        command: TrackerCommands,
    },
}

#[derive(Subcommand)]
enum TrackerCommands {
    /// List logged applications
    List {
        /// Filter by status (applied, interviewing, rejected, hired)
        #[arg(short, long)]
        status: Option<String>,

        /// Earliest deadline first, undated last
        #[arg(long)]
        by_deadline: bool,
    },

    /// Set the status of a row
    Status {
        /// Row number as shown by `tracker list`
        row: usize,

        /// applied, interviewing, rejected or hired
        status: String,
    },

    /// Set or clear the deadline of a row
    Deadline {
        /// Row number as shown by `tracker list`
        row: usize,

        /// YYYY-MM-DD, or "none" to clear
        date: String,
    },

    /// Interactive table editor
    Browse,

    /// Remove duplicate rows (same title, company and link), keeping the first
    Dedupe {
        /// Show what would be removed without removing
        #[arg(long)]
        dry_run: bool,
    },

    /// Export the whole log
    Export {
        /// Write a CSV copy to this path
        #[arg(long, value_name = "FILE", conflicts_with = "sheets", required_unless_present = "sheets")]
        csv: Option<PathBuf>,

        /// Publish to a new Google Sheets spreadsheet
        #[arg(long)]
        sheets: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity)
        .format_timestamp(None)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.paths.store = store;
    }
    let store = ApplicationStore::new(&config.paths.store);
    let session_path = Session::default_path();

    match cli.command {
        Commands::Search {
            query,
            location,
            employment_type,
            remote,
            source,
            resume,
            limit,
        } => {
            let resume_text = load_resume(resume.as_deref().unwrap_or(&config.paths.resume))?;

            let job_source: Box<dyn JobSource> = match source {
                SourceKind::Api => Box::new(JSearchSource::new(config.job_api()?, config.jobs.num_pages)),
                SourceKind::Board => Box::new(BoardScraper::new(&config.board)?),
            };

            let query = SearchQuery {
                query,
                location,
                employment_type,
                remote_only: remote,
            };

            println!("Searching {} for '{}'...", job_source.name(), query.full_text());
            let postings = source::search_or_empty(job_source.as_ref(), &query);

            let mut ranked = matcher::rank_postings(postings, &resume_text);
            ranked.truncate(limit);

            let mut session = Session::load(&session_path)?;
            session.replace_results(query.full_text(), ranked);
            session.save(&session_path)?;

            if session.results.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "\n{:<4} {:<30} {:<20} {:<18} {:>5}  {:<5}",
                    "#", "TITLE", "COMPANY", "LOCATION", "MATCH", "STARS"
                );
                println!("{}", "-".repeat(88));
                for (i, scored) in session.results.iter().enumerate() {
                    let posting = &scored.posting;
                    println!(
                        "{:<4} {:<30} {:<20} {:<18} {:>4}%  {}",
                        i + 1,
                        truncate(&posting.title, 28),
                        truncate(&posting.company, 18),
                        truncate(posting.location.as_deref().unwrap_or("-"), 16),
                        scored.score,
                        matcher::stars(scored.score)
                    );
                }
                println!("\nUse 'jobagent show <n>' for details.");
            }
        }

        Commands::Show { n } => {
            let mut session = Session::load(&session_path)?;
            let scored = session.select(n)?.clone();
            session.save(&session_path)?;

            let posting = &scored.posting;
            println!("Result #{}", n);
            println!("Title: {}", posting.title);
            println!("Company: {}", posting.company);
            if let Some(location) = &posting.location {
                println!("Location: {}", location);
            }
            println!("Link: {}", posting.link);
            println!("Match: {}% {}", scored.score, matcher::stars(scored.score));

            match document::extract_file(&config.paths.resume) {
                Ok(resume_text) if !resume_text.trim().is_empty() => {
                    let keywords = matcher::matched_keywords(&resume_text, posting.description_text());
                    if !keywords.is_empty() {
                        println!("Matched keywords: {}", keywords.join(", "));
                    }
                }
                _ => info!("resume unavailable, skipping keyword list"),
            }

            if let Some(description) = &posting.description {
                println!("\n--- Description ---");
                for line in textwrap::wrap(description, 100) {
                    println!("{}", line);
                }
            }
        }

        Commands::Match {
            resume,
            job_file,
            text,
        } => {
            let resume_text = load_resume(resume.as_deref().unwrap_or(&config.paths.resume))?;
            let description = match (job_file, text) {
                (Some(path), _) => document::extract_file(&path)?,
                (None, Some(text)) => text,
                (None, None) => bail!("Provide --job-file or --text"),
            };

            let score = matcher::match_score(&resume_text, &description);
            println!("Match Score: {}% {}", score, matcher::stars(score));

            let keywords = matcher::matched_keywords(&resume_text, &description);
            if !keywords.is_empty() {
                println!("Matched keywords ({}): {}", keywords.len(), keywords.join(", "));
            }
        }

        Commands::CoverLetter {
            n,
            resume,
            model,
            api_key,
            no_log,
        } => {
            let resume_text = load_resume(resume.as_deref().unwrap_or(&config.paths.resume))?;

            let mut session = Session::load(&session_path)?.with_api_key(api_key);
            let mut posting = session.select(n)?.posting.clone();
            session.save(&session_path)?;

            let spec = ai::resolve_model(model.as_deref().unwrap_or(&config.llm.model))?;
            let key = ai::resolve_api_key(&spec, session.credentials.llm_api_key.as_deref())?;
            let provider = ai::create_provider(&spec, key, config.llm.temperature);

            println!("Drafting cover letter for '{}' at '{}' with {}...", posting.title, posting.company, spec.short_name);
            let letter = ai::generate_cover_letter(
                provider.as_ref(),
                &posting.title,
                &posting.company,
                &resume_text,
                config.llm.cover_letter_chars,
            );
            if ai::is_error_output(&letter) {
                bail!("Cover letter generation failed: {}", generation_cause(&letter));
            }

            std::fs::create_dir_all(&config.paths.output_dir).with_context(|| {
                format!("Failed to create output directory: {}", config.paths.output_dir.display())
            })?;
            let letter_path = config.paths.output_dir.join(format!("cover_letter_{}.txt", n));
            std::fs::write(&letter_path, &letter)
                .with_context(|| format!("Failed to write to {}", letter_path.display()))?;

            println!("\n{}\n", letter);
            println!("Cover letter saved to: {}", letter_path.display());

            if !no_log {
                posting.cover_letter_path = letter_path.display().to_string();
                store.append(&ApplicationRecord::from(&posting))?;
                println!("Logged application to {}", store.path().display());
            }
        }

        Commands::RewriteResume {
            n,
            resume,
            model,
            api_key,
            output,
        } => {
            let resume_text = load_resume(resume.as_deref().unwrap_or(&config.paths.resume))?;

            let mut session = Session::load(&session_path)?.with_api_key(api_key);
            let posting = session.select(n)?.posting.clone();
            session.save(&session_path)?;

            let out_path = output.unwrap_or_else(|| config.paths.output_dir.join("rewritten_resume.docx"));
            document::ensure_parent_dir(&out_path)?;

            let spec = ai::resolve_model(model.as_deref().unwrap_or(&config.llm.model))?;
            let key = ai::resolve_api_key(&spec, session.credentials.llm_api_key.as_deref())?;
            let provider = ai::create_provider(&spec, key, config.llm.temperature);

            println!("Rewriting resume for '{}' at '{}' with {}...", posting.title, posting.company, spec.short_name);
            let rewritten = ai::rewrite_resume(
                provider.as_ref(),
                &posting,
                &resume_text,
                config.llm.rewrite_chars,
            );
            if ai::is_error_output(&rewritten) {
                bail!("Resume rewrite failed: {}", generation_cause(&rewritten));
            }

            document::write_docx(&out_path, &rewritten)?;
            println!("Rewritten resume saved to: {}", out_path.display());
        }

        Commands::Log { n, deadline } => {
            let deadline = match deadline {
                Some(value) => parse_deadline(&value)?,
                None => None,
            };

            let mut session = Session::load(&session_path)?;
            let mut posting = session.select(n)?.posting.clone();
            session.save(&session_path)?;

            posting.deadline = deadline;
            store.append(&ApplicationRecord::from(&posting))?;
            println!("Logged '{}' at '{}' to {}", posting.title, posting.company, store.path().display());
        }

        Commands::Tracker { command } => run_tracker_command(command, &store, &config)?,
    }

    Ok(())
}

fn run_tracker_command(command: TrackerCommands, store: &ApplicationStore, config: &Config) -> Result<()> {
    match command {
        TrackerCommands::List { status, by_deadline } => {
            let status = status.map(|s| s.parse::<ApplicationStatus>()).transpose()?;
            let records = store.load()?;

            let mut rows: Vec<(usize, &ApplicationRecord)> = records
                .iter()
                .enumerate()
                .map(|(i, r)| (i + 1, r))
                .filter(|(_, r)| status.is_none_or(|s| r.status == s))
                .collect();
            if by_deadline {
                rows.sort_by_key(|(_, r)| store::deadline_key(r));
            }

            println!("Total Applications: {}", records.len());
            if rows.is_empty() {
                println!("No applications found.");
                return Ok(());
            }

            println!(
                "\n{:<5} {:<2} {:<13} {:<28} {:<20} {:>5}  {:<10}",
                "ROW", "", "STATUS", "TITLE", "COMPANY", "MATCH", "DEADLINE"
            );
            println!("{}", "-".repeat(90));
            for (row, record) in rows {
                println!(
                    "{:<5} {:<2} {:<13} {:<28} {:<20} {:>5}  {:<10}",
                    row,
                    record.status.match_label(),
                    record.status,
                    truncate(&record.title, 26),
                    truncate(&record.company, 18),
                    record.match_score.map(|s| format!("{}%", s)).unwrap_or_else(|| "-".to_string()),
                    record.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
                );
            }
        }

        TrackerCommands::Status { row, status } => {
            let status: ApplicationStatus = status.parse()?;
            let updated = store.update_row(row_index(row)?, |r| r.status = status)?;
            println!("Row {}: '{}' at '{}' is now {}", row, updated.title, updated.company, status);
        }

        TrackerCommands::Deadline { row, date } => {
            let deadline = parse_deadline(&date)?;
            let updated = store.update_row(row_index(row)?, |r| r.deadline = deadline)?;
            match deadline {
                Some(d) => println!("Row {}: '{}' deadline set to {}", row, updated.title, d),
                None => println!("Row {}: '{}' deadline cleared", row, updated.title),
            }
        }

        TrackerCommands::Browse => tui::run_tracker(store)?,

        TrackerCommands::Dedupe { dry_run } => {
            let records = store.load()?;
            let duplicates = store::find_duplicates(&records);

            for &i in &duplicates {
                println!("  Row {}: '{}' at '{}'", i + 1, records[i].title, records[i].company);
            }

            if duplicates.is_empty() {
                println!("No duplicates found.");
            } else if dry_run {
                println!("\nWould remove {} duplicate(s)", duplicates.len());
            } else {
                let kept = store::dedupe(records);
                store.overwrite(&kept)?;
                println!("\nRemoved {} duplicate(s), {} row(s) remain", duplicates.len(), kept.len());
            }
        }

        TrackerCommands::Export { csv, sheets } => {
            let target: Box<dyn ExportTarget> = match (csv, sheets) {
                (Some(path), _) => Box::new(CsvExport::new(path)),
                (None, true) => Box::new(SheetsExport::from_config(&config.sheets)?),
                (None, false) => bail!("Choose an export target: --csv FILE or --sheets"),
            };

            let records = store.load()?;
            let reference = target.export(&records);
            if ai::is_error_output(&reference) {
                bail!("Export failed: {}", generation_cause(&reference));
            }
            println!("Exported {} application(s) to {}", records.len(), reference);
        }
    }

    Ok(())
}

/// Loads the resume text, halting before any network call when it is missing or empty.
fn load_resume(path: &Path) -> Result<String> {
    if !path.exists() {
        warn!("resume not found at {}", path.display());
        bail!(
            "Resume not found: {}. Pass --resume or set [paths].resume in the config",
            path.display()
        );
    }
    let text = document::extract_file(path)?;
    if text.trim().is_empty() {
        warn!("resume at {} produced no text", path.display());
        bail!("No text could be extracted from resume: {}", path.display());
    }
    info!("loaded resume from {} ({} chars)", path.display(), text.len());
    Ok(text)
}

/// 1-based row as shown to the user into a 0-based index.
fn row_index(row: usize) -> Result<usize> {
    row.checked_sub(1)
        .ok_or_else(|| anyhow!("Rows are numbered from 1"))
}

fn generation_cause(output: &str) -> &str {
    output.trim_start().trim_start_matches(ai::ERROR_PREFIX).trim()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Project Manager", 10), "Project...");
        assert_eq!(truncate("Größenwahn GmbH", 8), "Größe...");
    }

    #[test]
    fn test_row_index() {
        assert_eq!(row_index(1).unwrap(), 0);
        assert!(row_index(0).is_err());
    }

    #[test]
    fn test_generation_cause() {
        assert_eq!(generation_cause("Error: status 401"), "status 401");
    }

    #[test]
    fn test_missing_resume_halts() {
        let dir = tempdir().unwrap();
        assert!(load_resume(&dir.path().join("resume.txt")).is_err());

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "   \n").unwrap();
        assert!(load_resume(&empty).is_err());

        let resume = dir.path().join("resume.txt");
        std::fs::write(&resume, "project manager agile").unwrap();
        assert_eq!(load_resume(&resume).unwrap(), "project manager agile");
    }

    #[test]
    fn test_cli_parses_tracker_export() {
        let cli = Cli::try_parse_from(["jobagent", "tracker", "export", "--csv", "out.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tracker {
                command: TrackerCommands::Export { csv: Some(_), sheets: false }
            }
        ));

        assert!(Cli::try_parse_from(["jobagent", "tracker", "export"]).is_err());
        assert!(Cli::try_parse_from(["jobagent", "tracker", "export", "--csv", "a", "--sheets"]).is_err());
    }

    #[test]
    fn test_cli_global_store_flag() {
        let cli = Cli::try_parse_from(["jobagent", "tracker", "list", "--store", "log.csv"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("log.csv")));
        assert_eq!(cli.verbosity, LevelFilter::Warn);
    }
}
