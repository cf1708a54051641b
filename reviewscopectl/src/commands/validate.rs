use chrono::NaiveDateTime;
use clap::Args;
use serde::Serialize;

use crate::{parse_url, DisplayFallback, Result};

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Product page address
    pub url: String,
    /// Base name for the export file instead of the product slug
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub url: String,
    pub host: String,
    pub product_slug: String,
    pub suggested_file: String,
}

impl ValidateReport {
    pub fn build(args: &ValidateArgs, now: NaiveDateTime) -> Result<Self> {
        let url = parse_url(&args.url)?;
        Ok(Self {
            host: url.host().to_string(),
            product_slug: url.product_slug(),
            suggested_file: format!("{}.json", url.export_file_stem(args.name.as_deref(), now)),
            url: url.to_string(),
        })
    }
}

impl DisplayFallback for ValidateReport {
    fn display(&self) -> String {
        format!(
            "valid product page: {}\nhost: {}\nproduct: {}\nexport file: {}",
            self.url, self.host, self.product_slug, self.suggested_file
        )
    }
}
