//! HTML generation: product cards and template substitution.
//!
//! Templates use `{{ name }}` placeholders (inner whitespace optional, names
//! case-insensitive). Substitution is a single pass over the template, so
//! text coming from the API is never itself scanned for placeholders, and
//! tokens this module does not recognize are left as they are.

use crate::models::{Niche, ProductRecord};
use html_escape::{encode_double_quoted_attribute, encode_text};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Built-in template used when the template directory has no `index.html`.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../site_template/index.html");

/// Shown in place of the product grid when there is nothing to list.
pub const NO_PRODUCTS_HTML: &str = r#"<p class="no-products">No products found right now.</p>"#;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Values substituted into the template. Everything except `products_html`
/// is plain text and gets escaped on insertion.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub niche: String,
    pub title: String,
    pub description: String,
    pub h1: String,
    pub year: i32,
    /// Pre-rendered product cards (or [`NO_PRODUCTS_HTML`]).
    pub products_html: String,
}

impl PageContext {
    pub fn new(niche: &Niche, products: &[ProductRecord], year: i32) -> Self {
        let name = niche.display_name();
        Self {
            title: format!("Top {name} ({year})"),
            description: format!(
                "Best {} — curated picks with specs and links.",
                name.to_lowercase()
            ),
            h1: format!("Best {name} in {year}"),
            niche: name,
            year,
            products_html: render_cards(products),
        }
    }

    fn value(&self, name: &str) -> Option<String> {
        let text = |s: &str| encode_double_quoted_attribute(s).into_owned();
        match name.to_ascii_lowercase().as_str() {
            "niche" | "keyword" => Some(text(&self.niche)),
            "title" => Some(text(&self.title)),
            "description" => Some(text(&self.description)),
            "h1" => Some(text(&self.h1)),
            "year" => Some(self.year.to_string()),
            "products" | "product_cards" => Some(self.products_html.clone()),
            _ => None,
        }
    }
}

/// Replace every recognized placeholder in `template` exactly once.
pub fn fill_template(template: &str, ctx: &PageContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            ctx.value(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render one product card.
pub fn render_card(p: &ProductRecord) -> String {
    let image = (!p.image.is_empty()).then(|| {
        format!(
            "  <img src=\"{}\" alt=\"{}\" loading=\"lazy\" />",
            encode_double_quoted_attribute(&p.image),
            encode_double_quoted_attribute(&p.title)
        )
    });

    let badges = [
        p.rating.as_deref().map(|r| format!("⭐ {}", encode_text(r))),
        p.review_count.as_deref().map(|n| format!("{} reviews", encode_text(n))),
    ]
    .into_iter()
    .flatten()
    .map(|b| format!("<span class=\"badge\">{b}</span>"))
    .join(" ");
    let badges = (!badges.is_empty()).then(|| format!("  <div class=\"badges\">{badges}</div>"));

    [
        Some("<article class=\"card\">".to_string()),
        image,
        Some(format!("  <h3>{}</h3>", encode_text(&p.title))),
        Some(format!("  <div class=\"price\">{}</div>", encode_text(&p.price))),
        badges,
        Some(format!(
            "  <a class=\"btn\" href=\"{}\" target=\"_blank\" rel=\"nofollow sponsored noopener\">View on Amazon</a>",
            encode_double_quoted_attribute(&p.url)
        )),
        Some("</article>".to_string()),
    ]
    .into_iter()
    .flatten()
    .join("\n")
}

/// Render all cards, or the "no products" message for an empty list.
pub fn render_cards(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return NO_PRODUCTS_HTML.to_string();
    }
    products.iter().map(render_card).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn product(title: &str) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            image: "https://img.example.com/x.jpg".to_string(),
            price: "$10".to_string(),
            url: "https://amazon.com/dp/B1?ref=a&tag=t-20".to_string(),
            rating: Some("4.5".to_string()),
            review_count: Some("99".to_string()),
            asin: None,
        }
    }

    fn count(html: &str, selector: &str) -> usize {
        let doc = Html::parse_document(html);
        doc.select(&Selector::parse(selector).unwrap()).count()
    }

    #[test]
    fn test_cards_rendered_per_product() {
        let html = render_cards(&[product("A"), product("B"), product("C")]);
        assert_eq!(count(&html, "article.card"), 3);
        assert_eq!(count(&html, "span.badge"), 6);
        assert!(html.contains("href=\"https://amazon.com/dp/B1?ref=a&amp;tag=t-20\""));
    }

    #[test]
    fn test_empty_list_renders_message() {
        let html = render_cards(&[]);
        assert_eq!(html, NO_PRODUCTS_HTML);
        assert_eq!(count(&html, "article.card"), 0);
    }

    #[test]
    fn test_card_without_image_or_badges() {
        let card = render_card(&ProductRecord::default());
        assert!(!card.contains("<img"));
        assert!(!card.contains("badge"));
        assert!(card.contains("<h3>Unknown Product</h3>"));
        assert!(card.contains("href=\"#\""));
    }

    #[test]
    fn test_card_layout_is_exact() {
        let card = render_card(&ProductRecord {
            rating: Some("4.2".to_string()),
            ..Default::default()
        });
        assert_eq!(
            card,
            "<article class=\"card\">\n  <h3>Unknown Product</h3>\n  <div class=\"price\">N/A</div>\n  <div class=\"badges\"><span class=\"badge\">⭐ 4.2</span></div>\n  <a class=\"btn\" href=\"#\" target=\"_blank\" rel=\"nofollow sponsored noopener\">View on Amazon</a>\n</article>"
        );
    }

    #[test]
    fn test_card_escapes_text() {
        let card = render_card(&product("<script>alert(1)</script> & \"quotes\""));
        assert!(card.contains("<h3>&lt;script&gt;alert(1)&lt;/script&gt; &amp; \"quotes\"</h3>"));
        assert!(card.contains("&quot;quotes&quot;"));
    }

    #[test]
    fn test_fill_template_replaces_all_known_tokens() {
        let niche = Niche::new("bluetooth-earbuds");
        let ctx = PageContext::new(&niche, &[product("A")], 2025);
        let html = fill_template(
            "<title>{{ title }}</title><h1>{{h1}}</h1><p>{{ description }}</p>{{ description }}<div>{{ products }}</div>{{ niche }} {{ year }}",
            &ctx,
        );
        assert!(html.contains("<title>Top Bluetooth Earbuds (2025)</title>"));
        assert!(html.contains("<h1>Best Bluetooth Earbuds in 2025</h1>"));
        assert_eq!(html.matches("Best bluetooth earbuds — curated picks").count(), 2);
        assert!(html.contains("Bluetooth Earbuds 2025"));
        assert!(!html.contains("{{"));
        assert_eq!(count(&html, "article.card"), 1);
    }

    #[test]
    fn test_legacy_uppercase_markers() {
        let ctx = PageContext::new(&Niche::new("fitness trackers"), &[], 2025);
        let html = fill_template("{{TITLE}}|{{DESCRIPTION}}|{{H1}}|{{PRODUCT_CARDS}}", &ctx);
        assert_eq!(
            html,
            format!(
                "Top Fitness Trackers (2025)|Best fitness trackers — curated picks with specs and links.|Best Fitness Trackers in 2025|{NO_PRODUCTS_HTML}"
            )
        );
    }

    #[test]
    fn test_unknown_tokens_untouched_and_no_rescan() {
        let ctx = PageContext::new(&Niche::new("x"), &[product("{{ niche }}")], 2025);
        let html = fill_template("{{ unknown }} {{ products }}", &ctx);
        assert!(html.starts_with("{{ unknown }} "));
        assert!(html.contains("<h3>{{ niche }}</h3>"));
    }

    #[test]
    fn test_default_template_has_placeholders() {
        for token in ["{{ title }}", "{{ description }}", "{{ h1 }}", "{{ products }}"] {
            assert!(DEFAULT_TEMPLATE.contains(token), "missing {token}");
        }
    }
}
