use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PhotoError {
    #[error("photo payload is empty")]
    Empty,

    #[error("data URL is not base64 encoded")]
    NotBase64DataUrl,

    #[error("invalid base64: {0}")]
    Decode(String),
}

/// Decode a `data:<mime>;base64,<payload>` URL, or bare base64, to bytes.
pub fn decode_photo(raw: &str) -> Result<Vec<u8>, PhotoError> {
    let raw = raw.trim();
    let encoded = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest.split_once(',').ok_or(PhotoError::NotBase64DataUrl)?;
            if !meta.ends_with(";base64") {
                return Err(PhotoError::NotBase64DataUrl);
            }
            payload
        }
        None => raw,
    };

    // Clients wrap long payloads across lines.
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(PhotoError::Empty);
    }

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PhotoError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url() {
        let bytes = decode_photo("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decodes_bare_base64_with_line_breaks() {
        let bytes = decode_photo("aGVs\nbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn rejects_non_base64_data_url() {
        assert_eq!(decode_photo("data:text/plain,hello"), Err(PhotoError::NotBase64DataUrl));
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(matches!(decode_photo("data:image/jpeg;base64,***"), Err(PhotoError::Decode(_))));
        assert_eq!(decode_photo("data:image/jpeg;base64,"), Err(PhotoError::Empty));
    }
}
