use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid path expression: {0}")]
    Path(String),

    #[error("Invalid regular expression: {0}")]
    Regex(String),

    #[error("Unsupported regex flag '{0}' (supported: i, m, s, g)")]
    UnknownFlag(char),

    #[error("Chunk {requested} is out of range (payload has {total} chunk(s))")]
    ChunkRange { requested: usize, total: usize },
}
