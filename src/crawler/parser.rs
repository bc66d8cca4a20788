//! Parser chain for turning fetched responses into discovery records
//!
//! Parsers never decide what gets crawled. They report every resource they
//! find to a `DiscoveryListener` and leave scheduling to the controller.
//!
//! `HtmlLinkParser` reports:
//! - `<a href>` and `<area href>` links (except `download` links)
//! - `<link rel="canonical" href>`
//! - `<form>` submissions, as a GET with a query or a POST with a body
//! - `javascript:`, `mailto:`, `tel:` and `data:` links as ignored records

use crate::crawler::fetcher::FetchResponse;
use crate::discovery::{DiscoveryListener, DiscoveryRecord, DiscoveryRecordBuilder, HeaderField};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::{form_urlencoded, Url};

/// Schemes that never lead to a fetchable resource
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Input types that do not contribute a value to a form submission
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image", "file"];

/// Extracts resources from one kind of response
pub trait ResourceParser: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    fn can_parse(&self, response: &FetchResponse) -> bool;

    /// Reports every resource found in `response`
    ///
    /// `depth` is the depth of the record that produced the response; reported
    /// records sit one level deeper.
    fn parse(&self, response: &Arc<FetchResponse>, depth: u32, listener: &dyn DiscoveryListener);
}

/// Runs every registered parser that accepts a response
#[derive(Default)]
pub struct ParserChain {
    parsers: Vec<Box<dyn ResourceParser>>,
}

impl ParserChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parser: impl ResourceParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Returns the number of parsers that handled the response
    pub fn parse(
        &self,
        response: &Arc<FetchResponse>,
        depth: u32,
        listener: &dyn DiscoveryListener,
    ) -> usize {
        let mut used = 0;
        for parser in self.parsers.iter().filter(|p| p.can_parse(response)) {
            tracing::trace!("Running {} parser on {}", parser.name(), response.uri);
            parser.parse(response, depth, listener);
            used += 1;
        }
        used
    }
}

/// Link and form extractor for HTML documents
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkParser {
    request_headers: Vec<HeaderField>,
}

impl HtmlLinkParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers attached to every record this parser reports
    pub fn with_request_headers(headers: Vec<HeaderField>) -> Self {
        Self {
            request_headers: headers,
        }
    }
}

impl ResourceParser for HtmlLinkParser {
    fn name(&self) -> &'static str {
        "html"
    }

    fn can_parse(&self, response: &FetchResponse) -> bool {
        response.content_type.to_ascii_lowercase().contains("html")
    }

    fn parse(&self, response: &Arc<FetchResponse>, depth: u32, listener: &dyn DiscoveryListener) {
        let Ok(response_url) = Url::parse(&response.uri) else {
            tracing::debug!("Cannot resolve links against {:?}", response.uri);
            return;
        };

        let template = match DiscoveryRecord::builder()
            .source(Some(Arc::clone(response)))
            .depth(i64::from(depth) + 1)
        {
            Ok(builder) => builder.request_headers(self.request_headers.clone()),
            Err(e) => {
                tracing::warn!("Not reporting links from {}: {}", response.uri, e);
                return;
            }
        };

        let document = Html::parse_document(&response.body);
        let base = document_base(&document, &response_url);

        if let Ok(selector) = Selector::parse("a[href], area[href]") {
            for element in document.select(&selector) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                if let Some(record) = element
                    .value()
                    .attr("href")
                    .and_then(|href| link_record(&template, &base, href))
                {
                    listener.on_discovery(&record);
                }
            }
        }

        if let Ok(selector) = Selector::parse("link[rel='canonical'][href]") {
            for element in document.select(&selector) {
                if let Some(record) = element
                    .value()
                    .attr("href")
                    .and_then(|href| link_record(&template, &base, href))
                {
                    listener.on_discovery(&record);
                }
            }
        }

        if let Ok(selector) = Selector::parse("form") {
            for form in document.select(&selector) {
                if let Some(record) = form_record(&template, &base, form) {
                    listener.on_discovery(&record);
                }
            }
        }
    }
}

/// Resolves `<base href>` against the response URL, if present
fn document_base(document: &Html, response_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| response_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| response_url.clone())
}

fn has_ignored_scheme(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// Builds a GET record for a link, or an ignored record for unfetchable targets
///
/// Empty and fragment-only hrefs point back at the same document and are not
/// reported.
fn link_record(template: &DiscoveryRecordBuilder, base: &Url, href: &str) -> Option<DiscoveryRecord> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if has_ignored_scheme(href) {
        return Some(template.clone().uri(href).should_ignore(true).build());
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);

    let fetchable = matches!(resolved.scheme(), "http" | "https");
    Some(
        template
            .clone()
            .uri(resolved.as_str())
            .should_ignore(!fetchable)
            .build(),
    )
}

/// Builds the record a submission of `form` with its default values would produce
fn form_record(
    template: &DiscoveryRecordBuilder,
    base: &Url,
    form: ElementRef<'_>,
) -> Option<DiscoveryRecord> {
    let action = form.value().attr("action").map(str::trim).unwrap_or("");
    let is_post = form
        .value()
        .attr("method")
        .is_some_and(|m| m.trim().eq_ignore_ascii_case("post"));

    if has_ignored_scheme(action) {
        return Some(template.clone().uri(action).should_ignore(true).build());
    }

    let mut target = if action.is_empty() {
        base.clone()
    } else {
        base.join(action).ok()?
    };
    target.set_fragment(None);

    if !matches!(target.scheme(), "http" | "https") {
        return Some(
            template
                .clone()
                .uri(target.as_str())
                .should_ignore(true)
                .build(),
        );
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form_fields(form))
        .finish();

    let record = if is_post {
        template
            .clone()
            .method("POST")
            .uri(target.as_str())
            .body(encoded)
            .build()
    } else {
        target.set_query((!encoded.is_empty()).then_some(encoded.as_str()));
        template.clone().method("GET").uri(target.as_str()).build()
    };
    Some(record)
}

/// Collects the name/value pairs a form would submit by default
fn form_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let Ok(selector) = Selector::parse("input[name], select[name], textarea[name]") else {
        return fields;
    };

    for field in form.select(&selector) {
        let element = field.value();
        let Some(name) = element.attr("name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };

        let value = match element.name() {
            "input" => {
                let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                if SKIPPED_INPUT_TYPES.contains(&kind.as_str()) {
                    continue;
                }
                if matches!(kind.as_str(), "checkbox" | "radio") {
                    if element.attr("checked").is_none() {
                        continue;
                    }
                    element.attr("value").unwrap_or("on").to_string()
                } else {
                    element.attr("value").unwrap_or("").to_string()
                }
            }
            "select" => match selected_option(field) {
                Some(value) => value,
                None => continue,
            },
            "textarea" => field.text().collect(),
            _ => continue,
        };

        fields.push((name.to_string(), value));
    }

    fields
}

/// The selected option's value, falling back to the first option
fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let options = Selector::parse("option").ok()?;
    let option = select
        .select(&options)
        .find(|o| o.value().attr("selected").is_some())
        .or_else(|| select.select(&options).next())?;

    Some(
        option
            .value()
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| option.text().collect::<String>().trim().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryBatch;

    fn response(body: &str) -> Arc<FetchResponse> {
        Arc::new(FetchResponse {
            uri: "https://example.com/dir/page".to_string(),
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.to_string(),
        })
    }

    fn parse(body: &str) -> Vec<DiscoveryRecord> {
        let batch = DiscoveryBatch::new();
        HtmlLinkParser::new().parse(&response(body), 0, &batch);
        batch.into_records()
    }

    fn uris(records: &[DiscoveryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.uri()).collect()
    }

    #[test]
    fn test_can_parse_html_only() {
        let parser = HtmlLinkParser::new();
        let mut resp = (*response("")).clone();
        assert!(parser.can_parse(&resp));

        resp.content_type = "application/json".to_string();
        assert!(!parser.can_parse(&resp));

        resp.content_type = "application/XHTML+xml".to_string();
        assert!(parser.can_parse(&resp));
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let records = parse(
            r#"<html><body>
                <a href="/root">Root</a>
                <a href="sibling">Sibling</a>
                <a href="https://other.com/x">Other</a>
            </body></html>"#,
        );
        assert_eq!(
            uris(&records),
            vec![
                "https://example.com/root",
                "https://example.com/dir/sibling",
                "https://other.com/x"
            ]
        );
        assert!(records.iter().all(|r| r.method() == "GET" && !r.should_ignore()));
    }

    #[test]
    fn test_records_sit_one_level_deeper_and_keep_source() {
        let batch = DiscoveryBatch::new();
        let resp = response(r#"<a href="/next">Next</a>"#);
        HtmlLinkParser::new().parse(&resp, 2, &batch);

        let records = batch.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].depth(), 3);
        assert_eq!(records[0].source(), Some(&*resp));
    }

    #[test]
    fn test_base_href_is_honored() {
        let records = parse(
            r#"<html><head><base href="https://cdn.example.com/assets/"></head>
               <body><a href="img">Image</a></body></html>"#,
        );
        assert_eq!(uris(&records), vec!["https://cdn.example.com/assets/img"]);
    }

    #[test]
    fn test_fragments_are_stripped() {
        let records = parse(
            r##"<a href="/page#top">Top</a><a href="#local">Local</a><a href="">Empty</a>"##,
        );
        assert_eq!(uris(&records), vec!["https://example.com/page"]);
    }

    #[test]
    fn test_unfetchable_schemes_are_reported_as_ignored() {
        let records = parse(
            r#"<a href="javascript:void(0)">JS</a>
               <a href="MAILTO:someone@example.com">Mail</a>
               <a href="tel:+1234567890">Call</a>
               <a href="ftp://files.example.com/a">FTP</a>"#,
        );
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.should_ignore()));
        assert_eq!(records[0].uri(), "javascript:void(0)");
    }

    #[test]
    fn test_download_links_are_skipped() {
        let records = parse(r#"<a href="/file.pdf" download>Download</a>"#);
        assert!(records.is_empty());
    }

    #[test]
    fn test_canonical_and_area_links() {
        let records = parse(
            r#"<html><head><link rel="canonical" href="https://example.com/canonical"></head>
               <body><map><area href="/region"></map></body></html>"#,
        );
        let found = uris(&records);
        assert!(found.contains(&"https://example.com/canonical"));
        assert!(found.contains(&"https://example.com/region"));
    }

    #[test]
    fn test_get_form_builds_query() {
        let records = parse(
            r#"<form action="/search" method="get">
                <input type="text" name="q" value="rust">
                <input type="hidden" name="lang" value="en">
                <input type="submit" name="go" value="Go">
            </form>"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method(), "GET");
        assert_eq!(records[0].uri(), "https://example.com/search?q=rust&lang=en");
        assert_eq!(records[0].body(), "");
    }

    #[test]
    fn test_post_form_builds_body() {
        let records = parse(
            r#"<form action="/login" method="POST">
                <input name="user" value="a b">
                <input type="checkbox" name="remember" checked>
                <input type="checkbox" name="newsletter" value="yes">
                <select name="role"><option value="u">User</option><option value="a" selected>Admin</option></select>
                <textarea name="note">hi</textarea>
            </form>"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method(), "POST");
        assert_eq!(records[0].uri(), "https://example.com/login");
        assert_eq!(records[0].body(), "user=a+b&remember=on&role=a&note=hi");
    }

    #[test]
    fn test_form_without_action_targets_document() {
        let records = parse(r#"<form><input name="x" value="1"></form>"#);
        assert_eq!(uris(&records), vec!["https://example.com/dir/page?x=1"]);
    }

    #[test]
    fn test_configured_headers_are_attached() {
        let parser = HtmlLinkParser::with_request_headers(vec![
            HeaderField::new("Accept", "text/html"),
            HeaderField::new("X-Custom", "xyz"),
        ]);
        let batch = DiscoveryBatch::new();
        parser.parse(&response(r#"<a href="/a">A</a><a href="/b">B</a>"#), 0, &batch);

        for record in batch.into_records() {
            assert_eq!(record.request_headers().len(), 2);
            assert_eq!(record.request_headers()[0].name, "Accept");
        }
    }

    #[test]
    fn test_chain_runs_accepting_parsers_only() {
        let chain = ParserChain::new().with(HtmlLinkParser::new());
        assert_eq!(chain.len(), 1);

        let batch = DiscoveryBatch::new();
        let html = response(r#"<a href="/a">A</a>"#);
        assert_eq!(chain.parse(&html, 0, &batch), 1);

        let json = Arc::new(FetchResponse {
            content_type: "application/json".to_string(),
            ..(*html).clone()
        });
        assert_eq!(chain.parse(&json, 0, &batch), 0);
        assert_eq!(batch.len(), 1);
    }
}
