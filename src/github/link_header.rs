//! GitHub `Link:` header parsing.
//!
//! Paginated GitHub responses advertise their page set in a `Link:` header:
//!
//! ```text
//! <https://api.github.com/orgs/acme/repos?page=2>; rel="next",
//! <https://api.github.com/orgs/acme/repos?page=3>; rel="last"
//! ```
//!
//! The pagination engine only needs the page numbers, so this parser
//! extracts the `page` query parameter of each advertised relation rather
//! than keeping the URLs around.

use thiserror::Error;
use url::Url;

/// Errors that can occur when parsing a `Link:` header.
#[derive(Debug, Error)]
pub enum LinkHeaderError {
    /// A header segment did not contain a `<url>` part.
    #[error("link header segment has no <url> part: {0}")]
    MissingUrl(String),

    /// A header segment did not contain a `rel=\"...\"` parameter.
    #[error("link header segment has no rel parameter: {0}")]
    MissingRel(String),

    /// An advertised URL could not be parsed.
    #[error("invalid url in link header: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An advertised URL carried a non-numeric `page` parameter.
    #[error("non-numeric page parameter in link header: {0}")]
    BadPage(String),
}

/// The page numbers advertised by a `Link:` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub first: Option<u32>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub last: Option<u32>,
}

/// Parses a GitHub `Link:` header into its advertised page numbers.
///
/// Relations other than `first`/`prev`/`next`/`last` are ignored. A
/// relation whose URL has no `page` parameter is ignored as well; GitHub
/// always includes one on paginated endpoints.
///
/// # Errors
///
/// Returns an error if a segment is structurally malformed or carries a
/// non-numeric page number.
pub fn parse_link_header(header: &str) -> Result<PageLinks, LinkHeaderError> {
    let mut links = PageLinks::default();
    for segment in header.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (url, rel) = split_segment(segment)?;
        let page = page_of(url)?;
        match rel {
            "first" => links.first = page,
            "prev" => links.prev = page,
            "next" => links.next = page,
            "last" => links.last = page,
            _ => {}
        }
    }
    Ok(links)
}

/// Splits one header segment into its URL and rel name.
fn split_segment(segment: &str) -> Result<(&str, &str), LinkHeaderError> {
    let start = segment
        .find('<')
        .ok_or_else(|| LinkHeaderError::MissingUrl(segment.to_string()))?;
    let end = segment[start..]
        .find('>')
        .map(|i| start + i)
        .ok_or_else(|| LinkHeaderError::MissingUrl(segment.to_string()))?;
    let url = &segment[start + 1..end];

    let rel_start = segment[end..]
        .find("rel=\"")
        .map(|i| end + i + 5)
        .ok_or_else(|| LinkHeaderError::MissingRel(segment.to_string()))?;
    let rel_end = segment[rel_start..]
        .find('"')
        .map(|i| rel_start + i)
        .ok_or_else(|| LinkHeaderError::MissingRel(segment.to_string()))?;
    Ok((url, &segment[rel_start..rel_end]))
}

/// Extracts the `page` query parameter of an advertised URL.
fn page_of(url: &str) -> Result<Option<u32>, LinkHeaderError> {
    let parsed = Url::parse(url)?;
    for (key, value) in parsed.query_pairs() {
        if key == "page" {
            return value
                .parse::<u32>()
                .map(Some)
                .map_err(|_| LinkHeaderError::BadPage(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "<https://api.github.com/organizations/7/repos?page=2>; rel=\"next\", \
         <https://api.github.com/organizations/7/repos?page=3>; rel=\"last\"";

    #[test]
    fn parses_next_and_last() {
        let links = parse_link_header(HEADER).unwrap();
        assert_eq!(links.next, Some(2));
        assert_eq!(links.last, Some(3));
        assert_eq!(links.prev, None);
        assert_eq!(links.first, None);
    }

    #[test]
    fn parses_all_four_relations() {
        let header = "<https://x.test/a?page=1>; rel=\"first\", \
             <https://x.test/a?page=4>; rel=\"prev\", \
             <https://x.test/a?page=6>; rel=\"next\", \
             <https://x.test/a?page=9>; rel=\"last\"";
        let links = parse_link_header(header).unwrap();
        assert_eq!(links.first, Some(1));
        assert_eq!(links.prev, Some(4));
        assert_eq!(links.next, Some(6));
        assert_eq!(links.last, Some(9));
    }

    #[test]
    fn ignores_unknown_relations() {
        let header = "<https://x.test/a?page=2>; rel=\"canonical\"";
        let links = parse_link_header(header).unwrap();
        assert_eq!(links, PageLinks::default());
    }

    #[test]
    fn missing_url_is_an_error() {
        let result = parse_link_header("rel=\"next\"");
        assert!(matches!(result, Err(LinkHeaderError::MissingUrl(_))));
    }

    #[test]
    fn missing_rel_is_an_error() {
        let result = parse_link_header("<https://x.test/a?page=2>");
        assert!(matches!(result, Err(LinkHeaderError::MissingRel(_))));
    }

    #[test]
    fn bad_page_is_an_error() {
        let result = parse_link_header("<https://x.test/a?page=banana>; rel=\"last\"");
        assert!(matches!(result, Err(LinkHeaderError::BadPage(_))));
    }

    #[test]
    fn url_without_page_parameter_is_ignored() {
        let header = "<https://x.test/a?per_page=100>; rel=\"last\"";
        let links = parse_link_header(header).unwrap();
        assert_eq!(links.last, None);
    }

    #[test]
    fn empty_header_yields_no_pages() {
        assert_eq!(parse_link_header("").unwrap(), PageLinks::default());
    }

    proptest! {
        /// Any advertised last page is parsed back exactly.
        #[test]
        fn prop_last_page_roundtrip(page in 1u32..100_000) {
            let header = format!(
                "<https://api.github.com/orgs/acme/repos?page={}&per_page=100>; rel=\"last\"",
                page
            );
            let links = parse_link_header(&header).unwrap();
            prop_assert_eq!(links.last, Some(page));
        }
    }
}
