//! URL resolution against the configured base URL.

use crate::{Error, Result};
use std::collections::BTreeMap;
use url::Url;

/// Merges default and per-call query parameters; per-call values win.
pub fn merge_query(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Resolves `raw` into an absolute URL and appends `query`.
///
/// A URL with a scheme is used as-is. Anything else is a path relative to
/// `base`: one leading `/` is dropped and the rest is appended to the base
/// path. The base URL's own query and fragment are not carried over.
///
/// Query items already present in `raw` are kept; `query` items are appended
/// after them, so a key may appear more than once.
///
/// # Examples
///
/// ```
/// use fetchwire::resolve::resolve_url;
/// use std::collections::BTreeMap;
/// use url::Url;
///
/// let base = Url::parse("https://api.example.com").unwrap();
/// let query = BTreeMap::from([("page".to_string(), "1".to_string())]);
///
/// let url = resolve_url("/users", Some(&base), &query).unwrap();
/// assert_eq!(url.as_str(), "https://api.example.com/users?page=1");
/// ```
pub fn resolve_url(
    raw: &str,
    base: Option<&Url>,
    query: &BTreeMap<String, String>,
) -> Result<Url> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                Error::InvalidUrl(format!("relative URL '{}' without a base URL", raw))
            })?;
            join_relative(base, raw)?
        }
        Err(e) => return Err(Error::InvalidUrl(format!("{}: {}", raw, e))),
    };

    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!("'{}' is not a hierarchical URL", raw)));
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Ok(url)
}

fn join_relative(base: &Url, relative: &str) -> Result<Url> {
    let relative = relative.strip_prefix('/').unwrap_or(relative);

    let mut prefix = base.clone();
    prefix.set_query(None);
    prefix.set_fragment(None);
    let prefix = prefix.as_str().trim_end_matches('/');

    let joined = format!("{}/{}", prefix, relative);
    Url::parse(&joined).map_err(|e| Error::InvalidUrl(format!("{}: {}", joined, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_relative_path_appended_to_base() {
        let b = base("https://api.example.com");
        let url = resolve_url("/users", Some(&b), &query(&[("page", "1")])).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users?page=1");
    }

    #[test]
    fn test_relative_path_keeps_base_path() {
        let b = base("https://api.example.com/v1");
        let none = BTreeMap::new();

        assert_eq!(
            resolve_url("users/7", Some(&b), &none).unwrap().as_str(),
            "https://api.example.com/v1/users/7"
        );
        assert_eq!(
            resolve_url("/users/7", Some(&base("https://api.example.com/v1/")), &none)
                .unwrap()
                .as_str(),
            "https://api.example.com/v1/users/7"
        );
    }

    #[test]
    fn test_only_one_leading_slash_stripped() {
        let url = resolve_url("//users", Some(&base("https://api.example.com")), &BTreeMap::new())
            .unwrap();
        assert_eq!(url.path(), "//users");
    }

    #[test]
    fn test_absolute_url_ignores_base() {
        let url = resolve_url(
            "https://other.example.org/ping",
            Some(&base("https://api.example.com/v1")),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://other.example.org/ping");
    }

    #[test]
    fn test_relative_without_base_fails() {
        let result = resolve_url("/users", None, &BTreeMap::new());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_malformed_url_fails() {
        let result = resolve_url("http://exa mple.com/", None, &BTreeMap::new());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));

        let result = resolve_url("mailto:someone@example.com", None, &BTreeMap::new());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_existing_query_items_preserved() {
        let url = resolve_url(
            "/search?q=rust&page=2",
            Some(&base("https://api.example.com")),
            &query(&[("page", "3")]),
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "rust".to_string()),
                ("page".to_string(), "2".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_query_adds_no_question_mark() {
        let url = resolve_url("/users", Some(&base("https://api.example.com")), &BTreeMap::new())
            .unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_merge_query_override_wins() {
        let merged = merge_query(
            &query(&[("locale", "en"), ("format", "json")]),
            &query(&[("locale", "fr"), ("page", "1")]),
        );
        assert_eq!(merged, query(&[("format", "json"), ("locale", "fr"), ("page", "1")]));
    }

    #[test]
    fn test_merge_query_disjoint_keys_commute() {
        let a = query(&[("a", "1")]);
        let b = query(&[("b", "2")]);
        assert_eq!(merge_query(&a, &b), merge_query(&b, &a));
    }
}
