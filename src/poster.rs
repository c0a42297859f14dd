//! Structured poster layout for recruitment posts: the same data the client-side
//! generator draws, plus a plain-text version for messaging apps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::RecruitmentPost;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PosterLine {
    pub label: String,
    pub value: String,
}

/// Poster
///
/// Everything needed to draw a post's poster. `days_left` and `closed` are relative
/// to the date the poster was built for.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Poster {
    pub headline: String,
    pub organization: String,
    pub highlights: Vec<PosterLine>,
    pub apply_by: String,
    pub days_left: i64,
    pub closed: bool,
    pub image_key: Option<String>,
    pub share_text: String,
}

fn line(label: &str, value: impl Into<String>) -> PosterLine {
    PosterLine {
        label: label.to_string(),
        value: value.into(),
    }
}

impl Poster {
    pub fn build(post: &RecruitmentPost, today: NaiveDate) -> Self {
        let mut highlights = vec![
            line("Location", post.location.trim()),
            line("Vacancies", post.vacancies.to_string()),
            line("Qualification", post.qualification.trim()),
        ];
        if let Some(salary) = post.salary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            highlights.push(line("Salary", salary));
        }
        if let Some(contact) = post.contact.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            highlights.push(line("Contact", contact));
        }

        let remaining = (post.last_date - today).num_days();
        let apply_by = post.last_date.format("%d %b %Y").to_string();
        let headline = post.title.trim().to_uppercase();

        let mut share_text = format!("*{}*\n{}\n", headline, post.organization.trim());
        for h in &highlights {
            share_text.push_str(&format!("{}: {}\n", h.label, h.value));
        }
        if remaining < 0 {
            share_text.push_str(&format!("Applications closed on {apply_by}"));
        } else {
            share_text.push_str(&format!("Last date to apply: {apply_by}"));
        }

        Self {
            headline,
            organization: post.organization.trim().to_string(),
            highlights,
            apply_by,
            days_left: remaining.max(0),
            closed: remaining < 0,
            image_key: post.image_key.clone(),
            share_text,
        }
    }
}
