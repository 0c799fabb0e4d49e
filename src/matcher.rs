//! Lexical resume-to-job matching.
//!
//! Both texts are reduced to sets of lower-cased, whitespace-separated words.
//! There is no stemming, stop-word removal or term weighting.

use std::collections::HashSet;

use crate::models::{JobPosting, ScoredPosting};

pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Percentage of the description's vocabulary that also appears in the resume.
pub fn match_score(resume: &str, description: &str) -> u8 {
    score_tokens(&tokenize(resume), &tokenize(description))
}

pub fn score_tokens(resume: &HashSet<String>, description: &HashSet<String>) -> u8 {
    if description.is_empty() {
        return 0;
    }
    let overlap = description.intersection(resume).count();
    (100.0 * overlap as f64 / description.len() as f64).round() as u8
}

pub fn star_rating(score: u8) -> u8 {
    match score {
        90.. => 5,
        75..=89 => 4,
        50..=74 => 3,
        25..=49 => 2,
        _ => 1,
    }
}

pub fn stars(score: u8) -> String {
    "⭐".repeat(star_rating(score) as usize)
}

/// Words of the title found in the resume. A count, only used for ordering.
pub fn title_keyword_hits(title: &str, resume_tokens: &HashSet<String>) -> usize {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|word| resume_tokens.contains(*word))
        .count()
}

pub fn matched_keywords(resume: &str, description: &str) -> Vec<String> {
    let resume_tokens = tokenize(resume);
    let mut shared: Vec<String> = tokenize(description)
        .into_iter()
        .filter(|word| resume_tokens.contains(word))
        .collect();
    shared.sort();
    shared
}

pub fn rank_postings(postings: Vec<JobPosting>, resume: &str) -> Vec<ScoredPosting> {
    let resume_tokens = tokenize(resume);

    let mut scored: Vec<ScoredPosting> = postings
        .into_iter()
        .map(|mut posting| {
            let score = score_tokens(&resume_tokens, &tokenize(posting.description_text()));
            posting.match_score = Some(score);
            ScoredPosting {
                title_hits: title_keyword_hits(&posting.title, &resume_tokens),
                stars: star_rating(score),
                score,
                posting,
            }
        })
        .collect();

    // Stable: equal keys keep the order the source returned them in.
    scored.sort_by(|a, b| {
        b.title_hits
            .cmp(&a.title_hits)
            .then_with(|| b.score.cmp(&a.score))
    });

    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, description: &str) -> JobPosting {
        JobPosting {
            title: title.to_string(),
            company: "Acme".to_string(),
            link: format!("https://jobs.example.com/{}", title.replace(' ', "-")),
            description: Some(description.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_manager_scenario() {
        let resume = "project manager agile";
        let description = "Seeking a Project Manager with agile experience";

        assert_eq!(tokenize(description).len(), 7);
        // "seeking a project manager with agile experience" has 7 unique words;
        // the three shared ones are project, manager and agile.
        assert_eq!(match_score(resume, description), 43);
        assert_eq!(star_rating(43), 2);
    }

    #[test]
    fn test_half_overlap_scores_fifty_and_three_stars() {
        let resume = "project manager agile";
        let description = "Seeking Project Manager with agile experience";

        assert_eq!(tokenize(description).len(), 6);
        let score = match_score(resume, description);
        assert_eq!(score, 50);
        assert_eq!(star_rating(score), 3);
        assert_eq!(
            matched_keywords(resume, description),
            vec!["agile", "manager", "project"]
        );
    }

    #[test]
    fn test_empty_description_scores_zero() {
        assert_eq!(match_score("rust go python", ""), 0);
        assert_eq!(match_score("", ""), 0);
        assert_eq!(match_score("", "   \n\t "), 0);
    }

    #[test]
    fn test_empty_resume_scores_zero() {
        assert_eq!(match_score("", "rust engineer"), 0);
    }

    #[test]
    fn test_score_within_bounds() {
        let cases = [
            ("a b c", "a b c"),
            ("a", "a b c d e f g h i j"),
            ("x y z", "a b c"),
            ("a b c d e f", "a"),
        ];
        for (resume, description) in cases {
            let score = match_score(resume, description);
            assert!(score <= 100, "{} out of range", score);
        }
        assert_eq!(match_score("a b c", "a b c"), 100);
        assert_eq!(match_score("a b c d e f", "a"), 100);
    }

    #[test]
    fn test_score_rounds_to_nearest() {
        // 2 of 3 words: 66.67 rounds up
        assert_eq!(match_score("a b", "a b c"), 67);
        // 1 of 3 words: 33.33 rounds down
        assert_eq!(match_score("a", "a b c"), 33);
    }

    #[test]
    fn test_case_symmetry() {
        let resume = "Rust Kubernetes POSTGRES";
        let description = "We use rust, kubernetes and Postgres daily";
        assert_eq!(
            match_score(resume, description),
            match_score(&resume.to_uppercase(), &description.to_lowercase())
        );
    }

    #[test]
    fn test_order_and_repetition_invariance() {
        let a = match_score("agile project manager", "manager project agile scrum");
        let b = match_score(
            "manager manager agile project project",
            "scrum agile agile project manager manager",
        );
        assert_eq!(a, b);
        assert_eq!(a, 75);
    }

    #[test]
    fn test_star_bands() {
        assert_eq!(star_rating(100), 5);
        assert_eq!(star_rating(90), 5);
        assert_eq!(star_rating(89), 4);
        assert_eq!(star_rating(75), 4);
        assert_eq!(star_rating(74), 3);
        assert_eq!(star_rating(50), 3);
        assert_eq!(star_rating(49), 2);
        assert_eq!(star_rating(25), 2);
        assert_eq!(star_rating(24), 1);
        assert_eq!(star_rating(0), 1);
        assert_eq!(stars(92).chars().count(), 5);
    }

    #[test]
    fn test_star_bands_monotonic() {
        let mut previous = star_rating(0);
        for score in 1..=100u8 {
            let current = star_rating(score);
            assert!(current >= previous, "rating dropped at {}", score);
            previous = current;
        }
    }

    #[test]
    fn test_title_keyword_hits_counts_words() {
        let resume = tokenize("Senior Rust engineer with backend experience");
        assert_eq!(title_keyword_hits("Senior Backend Engineer", &resume), 3);
        assert_eq!(title_keyword_hits("Product Designer", &resume), 0);
        assert_eq!(title_keyword_hits("", &resume), 0);
    }

    #[test]
    fn test_rank_postings_sorts_by_title_hits_then_score() {
        let resume = "rust backend engineer postgres kafka";
        let postings = vec![
            posting("Marketing Lead", "rust postgres kafka"),
            posting("Backend Engineer", "java spring"),
            posting("Rust Backend Engineer", "rust postgres"),
        ];

        let ranked = rank_postings(postings, resume);
        let titles: Vec<&str> = ranked.iter().map(|s| s.posting.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Rust Backend Engineer", "Backend Engineer", "Marketing Lead"]
        );
        assert_eq!(ranked[0].score, 100);
        assert_eq!(ranked[0].posting.match_score, Some(100));
        assert_eq!(ranked[2].stars, 5);
    }

    #[test]
    fn test_rank_postings_keeps_source_order_on_ties() {
        let postings = vec![
            posting("First", "alpha"),
            posting("Second", "beta"),
            posting("Third", "gamma"),
        ];
        let ranked = rank_postings(postings, "unrelated words");
        let titles: Vec<&str> = ranked.iter().map(|s| s.posting.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_posting_without_description_scores_zero() {
        let mut p = posting("Rust Engineer", "");
        p.description = None;
        let ranked = rank_postings(vec![p], "rust engineer");
        assert_eq!(ranked[0].score, 0);
        assert_eq!(ranked[0].title_hits, 2);
    }
}
