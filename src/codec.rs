//! JSON decoding of response bodies.
//!
//! Three modes are offered: direct decoding, decoding after a byte transform,
//! and decoding the value found at a key path. All decode failures surface as
//! [`Error::DecodingFailed`]; a key path that leads nowhere is
//! [`Error::MissingKeyPath`].

use crate::{BoxError, Error, Response, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The JSON engine used for decoding.
///
/// [`SerdeJson`] is the default. Implement this to plug in custom decoding
/// (for example, a decoder that pre-processes numbers or dates).
pub trait JsonDecoder {
    /// Decodes bytes into a typed value.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> std::result::Result<T, BoxError>;

    /// Parses bytes into a generic JSON tree.
    fn parse(&self, bytes: &[u8]) -> std::result::Result<Value, BoxError> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }

    /// Renders a JSON tree back to canonical bytes.
    fn serialize(&self, value: &Value) -> std::result::Result<Vec<u8>, BoxError> {
        serde_json::to_vec(value).map_err(Into::into)
    }
}

/// `serde_json` with its default settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJson;

impl JsonDecoder for SerdeJson {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> std::result::Result<T, BoxError> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }
}

/// Decodes `body` directly.
pub fn decode<T, D>(body: &[u8], decoder: &D) -> Result<T>
where
    T: DeserializeOwned,
    D: JsonDecoder,
{
    decoder.decode(body).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %String::from_utf8_lossy(body),
            "Failed to deserialize response"
        );
        Error::DecodingFailed(e)
    })
}

/// Decodes `body` after passing it through `transform`.
///
/// A transform error that is itself an [`Error`] is returned unchanged; any
/// other transform error becomes [`Error::DecodingFailed`].
pub fn decode_transformed<T, D, F>(body: &[u8], transform: F, decoder: &D) -> Result<T>
where
    T: DeserializeOwned,
    D: JsonDecoder,
    F: FnOnce(&[u8]) -> std::result::Result<Vec<u8>, BoxError>,
{
    let transformed = transform(body).map_err(|e| match e.downcast::<Error>() {
        Ok(error) => *error,
        Err(other) => Error::DecodingFailed(other),
    })?;
    decode(&transformed, decoder)
}

/// Decodes the value found by walking `key_path` through nested objects.
///
/// # Examples
///
/// ```
/// use fetchwire::codec::{decode_at_key_path, SerdeJson};
/// use fetchwire::Error;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Item {
///     id: u64,
/// }
///
/// let body = br#"{"data":{"id":1}}"#;
///
/// let item: Item = decode_at_key_path(body, &["data"], &SerdeJson).unwrap();
/// assert_eq!(item.id, 1);
///
/// let missing = decode_at_key_path::<Item, _, _>(body, &["missing"], &SerdeJson);
/// assert!(matches!(missing, Err(Error::MissingKeyPath(path)) if path == vec!["missing"]));
/// ```
pub fn decode_at_key_path<T, D, S>(body: &[u8], key_path: &[S], decoder: &D) -> Result<T>
where
    T: DeserializeOwned,
    D: JsonDecoder,
    S: AsRef<str>,
{
    let root = decoder.parse(body).map_err(Error::DecodingFailed)?;

    let mut current = &root;
    for key in key_path {
        current = current
            .as_object()
            .and_then(|object| object.get(key.as_ref()))
            .ok_or_else(|| {
                Error::MissingKeyPath(key_path.iter().map(|k| k.as_ref().to_string()).collect())
            })?;
    }

    let located = decoder.serialize(current).map_err(Error::DecodingFailed)?;
    decode(&located, decoder)
}

impl Response {
    /// Decodes the body as JSON with [`SerdeJson`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        decode(&self.body, &SerdeJson)
    }

    /// Decodes the body as JSON with a caller-supplied decoder.
    pub fn json_with<T, D>(&self, decoder: &D) -> Result<T>
    where
        T: DeserializeOwned,
        D: JsonDecoder,
    {
        decode(&self.body, decoder)
    }

    /// Decodes the body as JSON after applying `transform` to the raw bytes.
    pub fn json_transformed<T, F>(&self, transform: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&[u8]) -> std::result::Result<Vec<u8>, BoxError>,
    {
        decode_transformed(&self.body, transform, &SerdeJson)
    }

    /// Decodes the JSON value found at `key_path`.
    pub fn json_at<T, S>(&self, key_path: &[S]) -> Result<T>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        decode_at_key_path(&self.body, key_path, &SerdeJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Id {
        id: u64,
    }

    #[test]
    fn test_direct_decode() {
        let user: User = decode(br#"{"id":1,"name":"Ada"}"#, &SerdeJson).unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Ada".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_shape_is_decoding_failed() {
        let result = decode::<User, _>(br#"{"id":"abc"}"#, &SerdeJson);
        assert!(matches!(result, Err(Error::DecodingFailed(_))));

        let result = decode::<User, _>(b"not json", &SerdeJson);
        assert!(matches!(result, Err(Error::DecodingFailed(_))));
    }

    #[test]
    fn test_transform_unwraps_envelope() {
        let body = br#"callback({"id":7})"#;
        let id: Id = decode_transformed(
            body,
            |bytes| Ok(bytes[9..bytes.len() - 1].to_vec()),
            &SerdeJson,
        )
        .unwrap();
        assert_eq!(id, Id { id: 7 });
    }

    #[test]
    fn test_transform_fetch_error_passes_through() {
        let result = decode_transformed::<Id, _, _>(
            b"{}",
            |_| Err(Box::new(Error::MissingKeyPath(vec!["envelope".into()])) as BoxError),
            &SerdeJson,
        );
        assert!(matches!(result, Err(Error::MissingKeyPath(path)) if path == vec!["envelope"]));
    }

    #[test]
    fn test_transform_other_error_is_decoding_failed() {
        let unwrap_envelope = |_: &[u8]| -> std::result::Result<Vec<u8>, BoxError> {
            Err("unexpected envelope".into())
        };
        let result = decode_transformed::<Id, _, _>(b"{}", unwrap_envelope, &SerdeJson);
        match result {
            Err(Error::DecodingFailed(source)) => {
                assert_eq!(source.to_string(), "unexpected envelope")
            }
            other => panic!("Expected DecodingFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_key_path_walks_nested_objects() {
        let body = br#"{"data":{"user":{"id":3,"name":"Grace"}}}"#;
        let user: User = decode_at_key_path(body, &["data", "user"], &SerdeJson).unwrap();
        assert_eq!(user.name, "Grace");
    }

    #[test]
    fn test_key_path_missing_key() {
        let body = br#"{"data":{"id":1}}"#;
        let result = decode_at_key_path::<Id, _, _>(body, &["missing"], &SerdeJson);
        assert!(matches!(result, Err(Error::MissingKeyPath(path)) if path == vec!["missing"]));
    }

    #[test]
    fn test_key_path_through_non_object() {
        let result =
            decode_at_key_path::<Id, _, _>(br#"{"data":[{"id":1}]}"#, &["data", "id"], &SerdeJson);
        assert!(matches!(result, Err(Error::MissingKeyPath(path)) if path == vec!["data", "id"]));
    }

    #[test]
    fn test_key_path_primitive_and_array_values() {
        let body = br#"{"meta":{"count":42,"label":"ok","flag":true,"none":null,"ids":[1,2]}}"#;

        let count: u64 = decode_at_key_path(body, &["meta", "count"], &SerdeJson).unwrap();
        let label: String = decode_at_key_path(body, &["meta", "label"], &SerdeJson).unwrap();
        let flag: bool = decode_at_key_path(body, &["meta", "flag"], &SerdeJson).unwrap();
        let none: Option<u64> = decode_at_key_path(body, &["meta", "none"], &SerdeJson).unwrap();
        let ids: Vec<u64> = decode_at_key_path(body, &["meta", "ids"], &SerdeJson).unwrap();

        assert_eq!(count, 42);
        assert_eq!(label, "ok");
        assert!(flag);
        assert_eq!(none, None);
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_key_path_on_invalid_json_is_decoding_failed() {
        let result = decode_at_key_path::<Id, _, _>(b"{", &["data"], &SerdeJson);
        assert!(matches!(result, Err(Error::DecodingFailed(_))));
    }

    #[test]
    fn test_empty_key_path_decodes_root() {
        let id: Id = decode_at_key_path::<Id, _, &str>(br#"{"id":9}"#, &[], &SerdeJson).unwrap();
        assert_eq!(id.id, 9);
    }
}
