#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid intent pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
