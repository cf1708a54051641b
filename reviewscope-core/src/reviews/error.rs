use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("rating {0} is outside 1..=5")]
    RatingOutOfRange(u8),
    #[error("invalid rating limit {0:?} (expected RATING=PAGES)")]
    LimitSyntax(String),
    #[error("invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("URL must be from Shopee (host was {0})")]
    UnsupportedHost(String),
    #[error("URL must be a product page")]
    NotProductPage,
    #[error("unknown scroll speed {0:?} (fast | medium | slow)")]
    ScrollSpeed(String),
}

pub type RequestResult<T> = Result<T, RequestError>;
