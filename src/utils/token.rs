use chrono::Utc;
use uuid::Uuid;

/// Produces candidate result tokens.
///
/// Injected into the result service so collision handling can be exercised
/// with a deterministic source.
pub trait TokenSource: Send + Sync {
    fn generate(&self, quiz_id: &str) -> String;
}

/// Default source: `{quiz slug}_{base36 millis}_{16 hex chars}`.
///
/// The slug keeps tokens readable in logs; nothing about the user leaks into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn generate(&self, quiz_id: &str) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let random = Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", quiz_slug(quiz_id), to_base36(millis), &random[..16])
    }
}

/// `senior_citizen_v1` -> `senior-citizen`.
pub fn quiz_slug(quiz_id: &str) -> String {
    let base = quiz_id.strip_suffix("_v1").unwrap_or(quiz_id);
    let slug: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() { "quiz".to_string() } else { slug.to_string() }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_quiz_slug() {
        assert_eq!(quiz_slug("senior_citizen_v1"), "senior-citizen");
        assert_eq!(quiz_slug("Q1"), "q1");
        assert_eq!(quiz_slug("__"), "quiz");
    }

    #[test]
    fn test_random_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..200).map(|_| RandomTokens.generate("Q1")).collect();
        assert_eq!(tokens.len(), 200);
        assert!(tokens.iter().all(|t| t.starts_with("q1_")));
    }
}
