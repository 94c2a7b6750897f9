//! Page renderer: turns a niche and its products into files on disk.

use super::assets::{TEMPLATE_FILE, copy_assets, reset_dir};
use super::html::{DEFAULT_TEMPLATE, PageContext, fill_template};
use super::json::write_page_data;
use crate::error::AppError;
use crate::models::{Niche, ProductRecord, RenderedPage};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Renders and writes one page per niche under the output root.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    template: String,
    template_dir: PathBuf,
    output_root: PathBuf,
}

impl PageRenderer {
    /// Load `<template_dir>/index.html`, falling back to the built-in template.
    pub fn load(template_dir: &Path, output_root: &Path) -> Result<Self, AppError> {
        let template_path = template_dir.join(TEMPLATE_FILE);
        let template = match std::fs::read_to_string(&template_path) {
            Ok(t) => {
                info!(path = %template_path.display(), "Loaded page template");
                t
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %template_path.display(), "Template not found; using built-in template");
                DEFAULT_TEMPLATE.to_string()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::with_template(template, template_dir, output_root))
    }

    pub fn with_template(template: String, template_dir: &Path, output_root: &Path) -> Self {
        Self {
            template,
            template_dir: template_dir.to_path_buf(),
            output_root: output_root.to_path_buf(),
        }
    }

    /// Directory a niche renders into: `<output_root>/<slug>`.
    pub fn page_dir(&self, niche: &Niche) -> PathBuf {
        self.output_root.join(&niche.slug)
    }

    /// Render the HTML for a niche without touching the file system.
    pub fn render_html(&self, niche: &Niche, products: &[ProductRecord], year: i32) -> String {
        let ctx = PageContext::new(niche, products, year);
        fill_template(&self.template, &ctx)
    }

    /// Render and write `<output_root>/<slug>/index.html` with its assets and
    /// `products.json`.
    ///
    /// The niche directory is emptied first (apart from `.git`), so
    /// re-rendering the same input yields the same directory contents.
    #[instrument(level = "info", skip_all, fields(slug = %niche.slug))]
    pub async fn write_page(
        &self,
        niche: &Niche,
        products: &[ProductRecord],
        year: i32,
    ) -> Result<RenderedPage, AppError> {
        let dir = self.page_dir(niche);
        reset_dir(&dir).await?;

        let assets = copy_assets(&self.template_dir, &dir).await?;
        let html = self.render_html(niche, products, year);
        let path = dir.join("index.html");
        fs::write(&path, &html).await?;
        write_page_data(&dir, niche, products).await?;

        debug!(path = %path.display(), products = products.len(), assets = assets.len(), "Page created");
        Ok(RenderedPage {
            slug: niche.slug.clone(),
            dir,
            path,
            html,
            product_count: products.len(),
            assets,
        })
    }
}
