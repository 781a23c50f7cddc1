//! DOM listing cards: per-card field extraction from serialized markup.

use scraper::Html;
use url::Url;

use crate::error::AppError;
use crate::models::CandidateRef;
use crate::snapshot::{element_text, parse_selector};

/// Locators read inside one listing card.
#[derive(Debug, Clone)]
pub struct CardLocators {
    /// Link carrying the id attribute, e.g. `a[data-jk]`.
    pub link: String,
    pub id_attribute: String,
    /// Element whose `title` attribute holds the full title.
    pub title: String,
    pub organization: String,
    pub locality: String,
}

impl CardLocators {
    /// Extracts a candidate from one card's outer HTML.
    ///
    /// Returns `Ok(None)` for cards without a link or id. Relative hrefs are
    /// resolved against `base`; a card without an href gets the canonical
    /// detail address built by `detail_url`.
    pub fn candidate<U>(
        &self,
        card_html: &str,
        base: &Url,
        detail_url: U,
    ) -> Result<Option<CandidateRef>, AppError>
    where
        U: Fn(&str) -> String,
    {
        let link_sel = parse_selector(&self.link)?;
        let title_sel = parse_selector(&self.title)?;
        let org_sel = parse_selector(&self.organization)?;
        let loc_sel = parse_selector(&self.locality)?;

        let fragment = Html::parse_fragment(card_html);
        let Some(link) = fragment.select(&link_sel).next() else {
            return Ok(None);
        };
        let Some(id) = link
            .value()
            .attr(&self.id_attribute)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(None);
        };

        let url = match link.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) {
            Some(href) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| detail_url(id)),
            None => detail_url(id),
        };

        let title = fragment
            .select(&title_sel)
            .next()
            .and_then(|el| el.value().attr("title"))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| non_empty(element_text(&link)));

        let mut candidate = CandidateRef::new(id, url);
        candidate.title = title;
        candidate.organization = fragment
            .select(&org_sel)
            .next()
            .and_then(|el| non_empty(element_text(&el)));
        candidate.locality = fragment
            .select(&loc_sel)
            .next()
            .and_then(|el| non_empty(element_text(&el)));
        Ok(Some(candidate))
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locators() -> CardLocators {
        CardLocators {
            link: "a[data-jk]".into(),
            id_attribute: "data-jk".into(),
            title: "span[title]".into(),
            organization: "[data-testid=\"company-name\"]".into(),
            locality: "[data-testid=\"text-location\"]".into(),
        }
    }

    fn base() -> Url {
        Url::parse("https://www.example.com").unwrap()
    }

    fn detail(id: &str) -> String {
        format!("https://www.example.com/viewjob?jk={id}")
    }

    #[test]
    fn reads_all_fields() {
        let html = r#"<li><div>
            <a data-jk="abc" href="/rc/clk?jk=abc&amp;from=serp"><span title="Senior Rust Engineer">Senior Rust…</span></a>
            <span data-testid="company-name">Acme</span>
            <div data-testid="text-location"> Remote </div>
        </div></li>"#;
        let c = locators().candidate(html, &base(), detail).unwrap().unwrap();
        assert_eq!(c.id, "abc");
        assert_eq!(c.url, "https://www.example.com/rc/clk?jk=abc&from=serp");
        assert_eq!(c.title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(c.organization.as_deref(), Some("Acme"));
        assert_eq!(c.locality.as_deref(), Some("Remote"));
    }

    #[test]
    fn falls_back_to_link_text_and_canonical_url() {
        let html = r#"<div><a data-jk="xyz"> Platform   Engineer </a></div>"#;
        let c = locators().candidate(html, &base(), detail).unwrap().unwrap();
        assert_eq!(c.title.as_deref(), Some("Platform Engineer"));
        assert_eq!(c.url, "https://www.example.com/viewjob?jk=xyz");
        assert_eq!(c.organization, None);
    }

    #[test]
    fn absolute_href_is_kept() {
        let html = r#"<a data-jk="q1" href="https://other.example.org/job/q1">Job</a>"#;
        let c = locators().candidate(html, &base(), detail).unwrap().unwrap();
        assert_eq!(c.url, "https://other.example.org/job/q1");
    }

    #[test]
    fn cards_without_id_are_skipped() {
        let html = r#"<div><a href="/ad">Sponsored</a></div>"#;
        assert!(locators().candidate(html, &base(), detail).unwrap().is_none());
        let html = r#"<div><a data-jk="" href="/ad">Sponsored</a></div>"#;
        assert!(locators().candidate(html, &base(), detail).unwrap().is_none());
    }
}
