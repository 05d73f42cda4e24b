//! Value encoding shared by every facade operation.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FacadeError, Result};

/// Encodes a value as JSON bytes.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Encodes every item of an iterator.
pub fn encode_all<T, I>(values: I) -> Result<Vec<Vec<u8>>>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    values.into_iter().map(|v| encode(&v)).collect()
}

/// Decodes bytes read from `key` as `T`, reporting a type mismatch on failure.
pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| FacadeError::TypeMismatch {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        visits: u32,
    }

    #[test]
    fn test_decode_struct() {
        let bytes = encode(&Session {
            user: "ada".to_string(),
            visits: 3,
        })
        .unwrap();
        assert_eq!(bytes, br#"{"user":"ada","visits":3}"#.to_vec());

        let decoded: Session = decode("session", &bytes).unwrap();
        assert_eq!(decoded.visits, 3);
    }

    #[test]
    fn test_decode_wrong_type() {
        let bytes = encode("not a number").unwrap();
        let result = decode::<u64>("counter", &bytes);
        assert!(matches!(
            result,
            Err(FacadeError::TypeMismatch { ref key, .. }) if key == "counter"
        ));
    }

    #[test]
    fn test_encode_all_keeps_order() {
        let encoded = encode_all(vec![3, 1, 2]).unwrap();
        assert_eq!(encoded, vec![b"3".to_vec(), b"1".to_vec(), b"2".to_vec()]);
    }
}
