use thiserror::Error;

/// Errors from parsing hashes and decoding blob bodies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A hash string was not valid hexadecimal.
    #[error("hash is not hex: {0}")]
    InvalidHex(String),

    /// A hash decoded to the wrong number of bytes.
    #[error("hash must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A JSON body could not be produced or parsed.
    #[error("blob body is not valid JSON for this type: {0}")]
    Serialization(String),

    /// The blob carries metadata only.
    #[error("blob has no body")]
    MissingBody,
}
