/// Errors that can occur during HTML-to-wikitext serialization.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SerializeError {
    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("selective serialization requires the original source text")]
    MissingOriginalSource,

    #[error("document has no <body> element")]
    MissingBody,
}
