//! `products.json` data file written next to each page.
//!
//! Lets client-side scripts and later tooling read the same products the
//! page was rendered from without scraping the HTML.

use crate::error::AppError;
use crate::models::{Niche, PageData, ProductRecord};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

pub const DATA_FILE: &str = "products.json";

/// Serialize the niche and its products to `<dir>/products.json`.
#[instrument(level = "debug", skip_all, fields(slug = %niche.slug))]
pub async fn write_page_data(
    dir: &Path,
    niche: &Niche,
    products: &[ProductRecord],
) -> Result<PathBuf, AppError> {
    let data = PageData {
        keyword: niche.keyword.clone(),
        slug: niche.slug.clone(),
        products: products.to_vec(),
    };
    let json = serde_json::to_string_pretty(&data)?;
    let path = dir.join(DATA_FILE);
    fs::write(&path, json).await?;
    debug!(path = %path.display(), "Wrote page data");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_page_data() {
        let tmp = tempfile::tempdir().unwrap();
        let niche = Niche::new("Standing Desks");
        let products = vec![ProductRecord {
            title: "Desk".to_string(),
            ..Default::default()
        }];

        let path = write_page_data(tmp.path(), &niche, &products).await.unwrap();
        let data: PageData = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(data.keyword, "Standing Desks");
        assert_eq!(data.slug, "standing-desks");
        assert_eq!(data.products, products);
    }
}
