pub mod estimate;
pub mod scrape;
pub mod validate;
