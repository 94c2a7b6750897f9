//! Page output: HTML rendering, static assets, and page data files.
//!
//! # Submodules
//!
//! - [`html`]: product cards and `{{ placeholder }}` substitution
//! - [`assets`]: static asset copy and niche directory reset
//! - [`json`]: the `products.json` data file
//! - [`page`]: [`PageRenderer`], which ties the above together
//!
//! # Output Structure
//!
//! ```text
//! output_root/
//! ├── bluetooth-earbuds/
//! │   ├── index.html
//! │   ├── products.json
//! │   └── style.css        # copied from the template directory
//! └── wireless-chargers/
//!     └── ...
//! ```

pub mod assets;
pub mod html;
pub mod json;
pub mod page;

pub use page::PageRenderer;
