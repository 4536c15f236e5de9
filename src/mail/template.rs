// src/mail/template.rs

use serde::Serialize;
use url::Url;

use crate::{mail::OutgoingMail, models::result::ScoreSummary};

/// Per-quiz display name used in subjects and greetings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizBranding {
    pub category: &'static str,
}

const BRANDS: [(&str, &str); 7] = [
    ("senior_citizen", "Senior Citizen Life"),
    ("divorce_conflict", "Divorce Conflict Resolution"),
    ("happiness_index", "Marriage Happiness Index"),
    ("pre_marriage_prep", "Pre-Marriage Preparation"),
    ("pre_marriage_compat", "Pre-Marriage Compatibility"),
    ("unemployed_career", "Career Guidance"),
    ("career_school", "Professional Development"),
];

const DEFAULT_BRAND: QuizBranding = QuizBranding {
    category: "Personal Assessment",
};

impl QuizBranding {
    pub fn for_quiz(quiz_id: &str) -> Self {
        BRANDS
            .iter()
            .find(|(fragment, _)| quiz_id.contains(fragment))
            .map(|(_, category)| QuizBranding { category: *category })
            .unwrap_or(DEFAULT_BRAND)
    }
}

/// What the user is told after finalizing.
#[derive(Debug, Clone)]
pub struct WelcomeNotice {
    pub to: String,
    pub name: String,
    pub quiz_id: String,
    pub summary: ScoreSummary,
    pub result_token: Option<String>,
}

/// What the operator is told about a new attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentNotice {
    pub email: String,
    pub name: String,
    pub quiz_id: String,
    pub score: f64,
    pub top_category: String,
}

/// Link to the hosted results page, when a site is configured.
pub fn results_link(site: &Url, quiz_id: &str, token: &str) -> Option<Url> {
    let mut url = site.join("results").ok()?;
    url.query_pairs_mut()
        .append_pair("quizId", quiz_id)
        .append_pair("token", token);
    Some(url)
}

pub fn welcome_mail(from: &str, notice: &WelcomeNotice, site: Option<&Url>) -> OutgoingMail {
    let brand = QuizBranding::for_quiz(&notice.quiz_id);

    let mut text = format!(
        "Hello {},\n\nThank you for completing the {} quiz.\n\nTop category: {}\n",
        notice.name, brand.category, notice.summary.top_category
    );
    for (category, points) in notice.summary.categories.iter() {
        text.push_str(&format!("  {}: {}\n", category, points));
    }

    let link = site.zip(notice.result_token.as_deref()).and_then(|(site, token)| {
        results_link(site, &notice.quiz_id, token)
    });
    if let Some(link) = link {
        text.push_str(&format!("\nView your full results: {}\n", link));
    }

    OutgoingMail {
        from: from.to_string(),
        to: notice.to.clone(),
        subject: format!("{}, your {} quiz result is ready", notice.name, brand.category),
        text,
    }
}

pub fn owner_mail(from: &str, to: &str, student: &StudentNotice) -> OutgoingMail {
    let details = serde_json::to_string_pretty(student).unwrap_or_else(|_| format!("{:?}", student));
    OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("New quiz attempt: {}", student.email),
        text: details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn notice(token: Option<&str>) -> WelcomeNotice {
        let mut categories = IndexMap::new();
        categories.insert("logic".to_string(), 2.0);
        WelcomeNotice {
            to: "ann@x.com".to_string(),
            name: "Ann".to_string(),
            quiz_id: "senior_citizen_v1".to_string(),
            summary: ScoreSummary {
                categories,
                top_category: "logic".to_string(),
                method_used: "categorical_sum".to_string(),
                total: 2.0,
            },
            result_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_branding_lookup() {
        assert_eq!(QuizBranding::for_quiz("senior_citizen_v1").category, "Senior Citizen Life");
        assert_eq!(QuizBranding::for_quiz("Q1").category, "Personal Assessment");
    }

    #[test]
    fn test_welcome_mail_includes_link_when_site_known() {
        let site = Url::parse("https://results.example.org/").unwrap();
        let mail = welcome_mail("Quiz <q@x.com>", &notice(Some("tok_1")), Some(&site));
        assert!(mail.subject.contains("Senior Citizen Life"));
        assert!(mail.text.contains("Top category: logic"));
        assert!(mail.text.contains("https://results.example.org/results?quizId=senior_citizen_v1&token=tok_1"));

        let mail = welcome_mail("Quiz <q@x.com>", &notice(Some("tok_1")), None);
        assert!(!mail.text.contains("http"));
    }
}
