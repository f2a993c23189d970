use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] bpi_client::Error),

    #[error(transparent)]
    Routing(#[from] bpi_routing::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
