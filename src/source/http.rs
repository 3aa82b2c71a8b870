//! HTTP source: `GET {base}?page=N&per_page=M` returning a JSON page body.
//!
//! Expected body:
//!
//! ```json
//! { "items": [...], "total": 120, "per_page": 20, "last_page": false }
//! ```
//!
//! `per_page` and `last_page` are optional; a missing `per_page` falls back to
//! the requested page size.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use super::{DataSource, PageRequest, Record, ResponsePayload};

#[derive(Deserialize)]
struct PageBody {
    items: Vec<Record>,
    total: usize,
    #[serde(default)]
    per_page: Option<usize>,
    #[serde(default)]
    last_page: bool,
}

pub struct HttpSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl DataSource<Record> for HttpSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<Record>> {
        debug!("http source: GET {} page={}", self.base_url, request.page);
        let mut response = self
            .agent
            .get(&self.base_url)
            .query("page", request.page.to_string())
            .query("per_page", request.modifiers.per_page.to_string())
            .call()
            .with_context(|| format!("GET {} page {} failed", self.base_url, request.page))?;
        let text = response
            .body_mut()
            .read_to_string()
            .context("failed to read response body")?;
        parse_page_body(&text, request)
    }
}

fn parse_page_body(text: &str, request: &PageRequest) -> Result<ResponsePayload<Record>> {
    let body: PageBody = serde_json::from_str(text).context("malformed page body")?;
    let mut payload = ResponsePayload::for_request(request, body.items, body.total, body.last_page);
    if let Some(per_page) = body.per_page {
        payload.per_page = per_page;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Modifiers;
    use crate::session::SessionToken;

    fn request() -> PageRequest {
        PageRequest {
            page: 2,
            modifiers: Modifiers {
                per_page: 3,
                ..Modifiers::default()
            },
            session: SessionToken::from("http-test"),
        }
    }

    #[test]
    fn full_body() {
        let p = parse_page_body(
            r#"{"items": ["a", "b"], "total": 5, "per_page": 2, "last_page": true}"#,
            &request(),
        )
        .unwrap();
        assert_eq!(p.count, 2);
        assert_eq!(p.total, 5);
        assert_eq!(p.per_page, 2);
        assert!(p.last_page);
        assert_eq!(p.session.as_str(), "http-test");
    }

    #[test]
    fn optional_fields_default() {
        let p = parse_page_body(r#"{"items": [], "total": 0}"#, &request()).unwrap();
        assert_eq!(p.per_page, 3);
        assert!(!p.last_page);
        assert_eq!(p.count, 0);
    }

    #[test]
    fn missing_items_is_an_error() {
        assert!(parse_page_body(r#"{"total": 3}"#, &request()).is_err());
    }
}
