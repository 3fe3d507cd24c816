/// Errors from the text merge engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// One input is not UTF-8 text.
    #[error("cannot merge binary content ({side} side)")]
    Binary { side: &'static str },
}
