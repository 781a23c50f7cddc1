//! Indeed listing profile.
//!
//! Locators are grouped by page kind and tried in order; the first one
//! that yields a value wins. Expect these to drift as the site changes.

use gleaner_core::cards::CardLocators;
use gleaner_core::challenge::ChallengeDetector;
use gleaner_core::error::AppError;
use gleaner_core::payload::ListingPayloadSpec;
use gleaner_core::profile::{ListingLocators, QueryBuilder, SiteProfile};
use gleaner_core::resolver::DetailLocators;
use url::Url;

pub const TAG: &str = "indeed";
pub const BASE_URL: &str = "https://www.indeed.com";

const MOSAIC_PATTERN: &str =
    r#"(?s)window\.mosaic\.providerData\["mosaic-provider-jobcards"\]\s*=\s*(\{.*?\});"#;
const MOSAIC_RESULTS: &str = "/metaData/mosaicProviderJobCardsModel/results";

const CHALLENGE_WIDGETS: &[&str] = &[
    r#"iframe[src*="hcaptcha"]"#,
    r#"iframe[src*="recaptcha"]"#,
    r#"div[class*="captcha"]"#,
    r#"div[id*="captcha"]"#,
    "#px-captcha",
    ".g-recaptcha",
];

const CHALLENGE_PHRASES: &[&str] = &[
    "security check",
    "verify you're human",
    "access denied",
    "blocked",
];

const COMPENSATION_PATTERNS: &[&str] = &[
    r"[$₹€£¥]\s*[\d,]+(?:\.\d{2})?\s*-\s*[$₹€£¥]\s*[\d,]+(?:\.\d{2})?",
    r"[\d,]+(?:\.\d{2})?\s*-\s*[\d,]+(?:\.\d{2})?\s*(?:per|/)\s*(?:month|year|hour)",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Profile for `www.indeed.com` search and job pages.
pub fn indeed_profile() -> Result<SiteProfile, AppError> {
    let base_url = Url::parse(BASE_URL)
        .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{BASE_URL}': {e}")))?;

    Ok(SiteProfile {
        tag: TAG.into(),
        base_url,
        home_url: format!("{BASE_URL}/"),
        query: QueryBuilder {
            path: "/jobs".into(),
            query_param: "q".into(),
            locality_param: "l".into(),
            offset_param: "start".into(),
            fixed: vec![("sort".into(), "date".into())],
        },
        detail_path: "/viewjob".into(),
        id_param: "jk".into(),
        listing: ListingLocators {
            cards: strings(&[
                "#mosaic-provider-jobcards > div > ul > li > div > div > div > div.slider_item > div > div > table > tbody > tr > td",
                "#mosaic-provider-jobcards ul li div.slider_item",
                "#mosaic-provider-jobcards ul li",
            ]),
            card: CardLocators {
                link: "a[data-jk]".into(),
                id_attribute: "data-jk".into(),
                title: "span[title]".into(),
                organization: r#"[data-testid="company-name"]"#.into(),
                locality: r#"[data-testid="text-location"]"#.into(),
            },
            next_page: r#"a[data-testid="pagination-page-next"]"#.into(),
            query_input: "#text-input-what".into(),
            locality_input: "#text-input-where".into(),
            search_button: r#"#jobsearch button[type="submit"]"#.into(),
        },
        listing_payload: Some(ListingPayloadSpec::new(MOSAIC_PATTERN, MOSAIC_RESULTS, "jobkey")?),
        listing_detector: ChallengeDetector::new(
            CHALLENGE_WIDGETS.iter().copied(),
            "#mosaic-provider-jobcards",
            CHALLENGE_PHRASES.iter().copied(),
        ),
        detail_detector: ChallengeDetector::new(
            CHALLENGE_WIDGETS.iter().copied(),
            "#jobDescriptionText",
            CHALLENGE_PHRASES.iter().copied(),
        ),
        detail: DetailLocators {
            title: strings(&[
                r#"h2[data-testid*="jobsearch-JobInfoHeader-title"] span"#,
                r#"h1[class*="jobsearch-JobInfoHeader-title"]"#,
                "h2.jobsearch-JobInfoHeader-title span",
            ]),
            organization: strings(&[
                "div[data-company-name]",
                r#"a[data-tn-element="companyName"]"#,
                r#"span[class*="companyName"] a"#,
                "div.jobsearch-InlineCompanyRating div",
            ]),
            locality: strings(&[
                r#"div[data-testid*="location"]"#,
                r#"div[class*="jobsearch-JobInfoHeader-subtitle"] div"#,
                "div.jobsearch-JobInfoHeader-subtitle div",
            ]),
            description: strings(&["div#jobDescriptionText", "#jobDescriptionText"]),
            compensation: strings(&["#salaryInfoAndJobType span"]),
            posted_at: vec![],
            json_ld: r#"script[type="application/ld+json"]"#.into(),
        },
        compensation_patterns: strings(COMPENSATION_PATTERNS),
    })
}
