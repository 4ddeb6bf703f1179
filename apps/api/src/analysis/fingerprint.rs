//! Request fingerprints used as cache keys.
//!
//! Inputs are trimmed and truncated *before* hashing, so edits past the
//! truncation points still hit the same cache entry.

use sha2::{Digest, Sha256};

/// Resume characters that count towards a fingerprint.
pub const RESUME_FINGERPRINT_CHARS: usize = 5_000;
/// Job description characters that count towards a fingerprint.
pub const JOB_FINGERPRINT_CHARS: usize = 3_000;
/// Resume characters that count towards a role-suggestion fingerprint.
pub const ROLE_RESUME_FINGERPRINT_CHARS: usize = 500;

/// SHA-256 of the normalized input, lowercase hex (64 chars).
pub fn fingerprint(normalized_input: &str) -> String {
    hex::encode(Sha256::digest(normalized_input.as_bytes()))
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Skill-gap and rewrite requests: resume head + job description head.
pub fn resume_job_input(resume_text: &str, job_description: &str) -> String {
    let mut input = String::new();
    input.push_str(truncate_chars(resume_text.trim(), RESUME_FINGERPRINT_CHARS));
    input.push_str(truncate_chars(job_description.trim(), JOB_FINGERPRINT_CHARS));
    input
}

/// Project suggestions: sorted skills joined by `,`, then the job title.
pub fn skills_title_input(skills: &[String], job_title: &str) -> String {
    format!("{}{}", sorted_join(skills), job_title.trim())
}

/// Role suggestions: sorted skills, job title, then the resume head.
pub fn role_input(matched_skills: &[String], job_title: &str, resume_text: &str) -> String {
    format!(
        "{}{}{}",
        sorted_join(matched_skills),
        job_title.trim(),
        truncate_chars(resume_text.trim(), ROLE_RESUME_FINGERPRINT_CHARS)
    )
}

/// GitHub analysis: case-insensitive on both username and role.
pub fn github_input(username: &str, target_role: &str) -> String {
    format!(
        "{}{}",
        username.trim().to_lowercase(),
        target_role.trim().to_lowercase()
    )
}

fn sorted_join(items: &[String]) -> String {
    let mut items: Vec<&str> = items.iter().map(|s| s.trim()).collect();
    items.sort_unstable();
    items.join(",")
}
