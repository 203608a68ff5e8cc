use chrono::Datelike;

use crate::models::File;

const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Citation-relevant fields of a published file, with defaults applied.
pub struct CitationInfo {
    pub title: String,
    pub author: String,
    pub year: Option<i32>,
    pub url: String,
}

impl CitationInfo {
    pub fn new(file: &File, author_name: Option<&str>, base_url: &str) -> Self {
        let title = if file.title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            file.title.trim().to_string()
        };
        let author = author_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();
        let year = file.published_at.map(|at| at.year());
        let identifier = file
            .permalink_slug
            .as_deref()
            .or(file.public_uuid.as_deref())
            .unwrap_or("");
        let url = format!("{}/ication/{}", base_url.trim_end_matches('/'), identifier);

        Self {
            title,
            author,
            year,
            url,
        }
    }

    fn year_or_nd(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string())
    }
}

pub fn apa(info: &CitationInfo) -> String {
    format!(
        "{} ({}). {}. Aris Preprints. {}",
        info.author,
        info.year_or_nd(),
        info.title,
        info.url
    )
}

pub fn mla(info: &CitationInfo) -> String {
    format!(
        "{}. \"{}.\" Aris Preprints, {}, {}.",
        info.author,
        info.title,
        info.year_or_nd(),
        info.url
    )
}

pub fn chicago(info: &CitationInfo) -> String {
    format!(
        "{}. \"{}.\" Aris Preprints ({}). {}.",
        info.author,
        info.title,
        info.year_or_nd(),
        info.url
    )
}

pub fn bibtex(info: &CitationInfo) -> String {
    let surname = info
        .author
        .split_whitespace()
        .last()
        .unwrap_or("unknown")
        .to_lowercase();
    let key = format!("{}{}", surname, info.year_or_nd().replace('.', ""));

    let mut entry = String::new();
    entry.push_str(&format!("@misc{{{key},\n"));
    entry.push_str(&format!("  author = {{{}}},\n", info.author));
    entry.push_str(&format!("  title = {{{}}},\n", info.title));
    if let Some(year) = info.year {
        entry.push_str(&format!("  year = {{{year}}},\n"));
    }
    entry.push_str("  howpublished = {Aris Preprints},\n");
    entry.push_str(&format!("  url = {{{}}}\n", info.url));
    entry.push('}');
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn published_file(title: &str) -> File {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        File {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            abstract_text: None,
            keywords: None,
            status: "published".to_string(),
            source: ":rsm:x::".to_string(),
            published_at: Some(now),
            public_uuid: Some("aB3xY9".to_string()),
            permalink_slug: None,
            version: 1,
            prev_version_id: None,
            created_at: now,
            last_edited_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn apa_includes_author_year_title() {
        let file = published_file("Tidal Dynamics");
        let info = CitationInfo::new(&file, Some("Grace Hopper"), "https://aris.example.org");
        let cite = apa(&info);
        assert!(cite.contains("Grace Hopper (2025). Tidal Dynamics"));
        assert!(cite.contains("/ication/aB3xY9"));
    }

    #[test]
    fn defaults_apply_for_missing_fields() {
        let mut file = published_file("  ");
        file.published_at = None;
        let info = CitationInfo::new(&file, None, "https://aris.example.org/");
        assert_eq!(info.title, "Untitled");
        assert_eq!(info.author, "Unknown Author");
        assert!(apa(&info).contains("(n.d.)"));
    }

    #[test]
    fn bibtex_key_uses_surname_and_year() {
        let file = published_file("Tidal Dynamics");
        let info = CitationInfo::new(&file, Some("Grace Hopper"), "https://aris.example.org");
        let entry = bibtex(&info);
        assert!(entry.starts_with("@misc{hopper2025,"));
        assert!(entry.contains("title = {Tidal Dynamics}"));
        assert!(entry.ends_with('}'));
    }

    #[test]
    fn permalink_slug_wins_over_public_uuid() {
        let mut file = published_file("Tidal Dynamics");
        file.permalink_slug = Some("tidal-dynamics".to_string());
        let info = CitationInfo::new(&file, None, "https://aris.example.org");
        assert!(info.url.ends_with("/ication/tidal-dynamics"));
    }

    #[test]
    fn mla_and_chicago_quote_the_title() {
        let file = published_file("Tidal Dynamics");
        let info = CitationInfo::new(&file, Some("Grace Hopper"), "https://aris.example.org");
        assert!(mla(&info).contains("\"Tidal Dynamics.\""));
        assert!(chicago(&info).contains("\"Tidal Dynamics.\""));
    }
}
