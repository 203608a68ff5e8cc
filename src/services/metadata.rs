use serde_json::{json, Value};

use crate::models::File;
use crate::services::citation::CitationInfo;

fn keywords_list(file: &File) -> Vec<String> {
    file.keywords
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn dublin_core(file: &File, info: &CitationInfo) -> Value {
    json!({
        "dc.title": info.title,
        "dc.creator": info.author,
        "dc.type": "Preprint",
        "dc.format": "text/html",
        "dc.identifier": info.url,
        "dc.date": file.published_at.map(|at| at.format("%Y-%m-%d").to_string()),
        "dc.description": file.abstract_text,
        "dc.subject": keywords_list(file),
        "dc.publisher": "Aris Preprints",
    })
}

pub fn schema_org(file: &File, info: &CitationInfo) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "ScholarlyArticle",
        "headline": info.title,
        "author": {
            "@type": "Person",
            "name": info.author,
        },
        "datePublished": file.published_at.map(|at| at.format("%Y-%m-%d").to_string()),
        "abstract": file.abstract_text,
        "keywords": keywords_list(file).join(", "),
        "url": info.url,
        "publisher": {
            "@type": "Organization",
            "name": "Aris Preprints",
        },
    })
}

pub fn open_graph(file: &File, info: &CitationInfo) -> Vec<(String, String)> {
    let mut tags = vec![
        ("og:type".to_string(), "article".to_string()),
        ("og:title".to_string(), info.title.clone()),
        ("og:url".to_string(), info.url.clone()),
        ("og:site_name".to_string(), "Aris Preprints".to_string()),
    ];
    if let Some(description) = file.abstract_text.as_deref() {
        tags.push(("og:description".to_string(), description.to_string()));
    }
    if let Some(published_at) = file.published_at {
        tags.push((
            "article:published_time".to_string(),
            published_at.to_rfc3339(),
        ));
    }
    tags
}

pub fn highwire(file: &File, info: &CitationInfo) -> Vec<(String, String)> {
    let mut tags = vec![
        ("citation_title".to_string(), info.title.clone()),
        ("citation_author".to_string(), info.author.clone()),
        (
            "citation_publisher".to_string(),
            "Aris Preprints".to_string(),
        ),
        ("citation_abstract_html_url".to_string(), info.url.clone()),
    ];
    if let Some(published_at) = file.published_at {
        tags.push((
            "citation_publication_date".to_string(),
            published_at.format("%Y/%m/%d").to_string(),
        ));
    }
    for keyword in keywords_list(file) {
        tags.push(("citation_keywords".to_string(), keyword));
    }
    tags
}

/// Standalone HTML page for a published preprint: citation meta tags in the
/// head, rendered content in the body.
pub fn static_page(file: &File, info: &CitationInfo, rendered_html: &str) -> String {
    let mut head = String::new();
    for (name, content) in highwire(file, info) {
        head.push_str(&format!(
            "    <meta name=\"{}\" content=\"{}\">\n",
            name,
            html_escape::encode_double_quoted_attribute(&content)
        ));
    }
    for (property, content) in open_graph(file, info) {
        head.push_str(&format!(
            "    <meta property=\"{}\" content=\"{}\">\n",
            property,
            html_escape::encode_double_quoted_attribute(&content)
        ));
    }

    let title = html_escape::encode_text(&info.title);
    let author = html_escape::encode_text(&info.author);
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
             <meta charset=\"utf-8\">\n\
             <title>{title} | Aris Preprints</title>\n\
         {head}\
         </head>\n\
         <body>\n\
             <header><h1>{title}</h1><p class=\"byline\">{author}</p></header>\n\
             <main>{rendered_html}</main>\n\
             <footer>Published on Aris Preprints</footer>\n\
         </body>\n\
         </html>\n"
    )
}
