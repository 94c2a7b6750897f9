//! Field-level normalization of product entries.
//!
//! Each target field has a list of source field names seen across the API's
//! endpoints, tried in order. Strings are trimmed (empty counts as missing),
//! numbers are stringified, and price-like objects are flattened through their
//! `raw`/`display`/`value` members.

use crate::models::ProductRecord;
use crate::utils::with_associate_tag;
use serde_json::{Map, Value};
use tracing::debug;

const TITLE_FIELDS: &[&str] = &["product_title", "title", "name", "deal_title"];
const IMAGE_FIELDS: &[&str] = &[
    "product_main_image_url",
    "product_photo",
    "image",
    "image_url",
    "imageUrl",
    "thumbnail",
    "deal_photo",
];
const PRICE_FIELDS: &[&str] = &[
    "product_price",
    "price",
    "app_sale_price",
    "deal_price",
    "current_price",
    "sale_price",
];
const URL_FIELDS: &[&str] = &[
    "product_detail_url",
    "product_url",
    "url",
    "link",
    "detail_url",
    "deal_url",
];
const RATING_FIELDS: &[&str] = &["product_star_rating", "rating", "stars", "star_rating"];
const REVIEW_FIELDS: &[&str] = &[
    "product_num_ratings",
    "reviews_count",
    "reviewCount",
    "review_count",
    "ratings_total",
    "num_reviews",
];
/// Totals reported by reviews endpoints, preferred over counting the page.
const REVIEW_TOTAL_FIELDS: &[&str] = &[
    "total_reviews",
    "total_ratings",
    "total_review_count",
    "reviews_count",
    "ratings_total",
];
const ID_FIELDS: &[&str] = &["asin", "product_id", "id"];

/// Nested members consulted when a field holds an object (e.g. a price).
const NESTED_FIELDS: &[&str] = &["raw", "display", "formatted", "value", "amount"];

/// Render a scalar JSON value as a non-empty string.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => NESTED_FIELDS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| match v {
                Value::Object(_) => None,
                other => scalar_string(other),
            }),
        _ => None,
    }
}

/// First candidate field present in `obj` with a usable value.
fn first_string(obj: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(scalar_string)
}

/// Normalize one entry. Returns `None` when the entry is not a JSON object.
pub fn normalize_item(item: &Value, assoc_tag: Option<&str>) -> Option<ProductRecord> {
    let obj = item.as_object()?;
    let defaults = ProductRecord::default();

    let url = first_string(obj, URL_FIELDS).unwrap_or(defaults.url);
    let url = match assoc_tag {
        Some(tag) => with_associate_tag(&url, tag),
        None => url,
    };

    Some(ProductRecord {
        title: first_string(obj, TITLE_FIELDS).unwrap_or(defaults.title),
        image: first_string(obj, IMAGE_FIELDS).unwrap_or(defaults.image),
        price: first_string(obj, PRICE_FIELDS).unwrap_or(defaults.price),
        url,
        rating: first_string(obj, RATING_FIELDS),
        review_count: first_string(obj, REVIEW_FIELDS),
        asin: first_string(obj, ID_FIELDS),
    })
}

/// Normalize a product list, skipping non-object entries, keeping at most `max`.
pub fn normalize_items(items: &[Value], max: usize, assoc_tag: Option<&str>) -> Vec<ProductRecord> {
    let products: Vec<ProductRecord> = items
        .iter()
        .filter_map(|item| normalize_item(item, assoc_tag))
        .take(max)
        .collect();
    let skipped = items.len().min(max).saturating_sub(products.len());
    if skipped > 0 {
        debug!(skipped, "Skipped non-object product entries");
    }
    products
}

/// The object describing a single product in a detail response.
///
/// Detail endpoints answer either with the product at the top level or
/// wrapped in `data`.
fn detail_object(body: &Value) -> Option<&Map<String, Value>> {
    body.get("data")
        .and_then(Value::as_object)
        .or_else(|| body.as_object())
}

/// Overlay fields from a detail response onto a search record.
///
/// Only fields the detail response actually carries replace the record's
/// values; missing ones keep what the search call produced.
pub fn merge_detail(record: &mut ProductRecord, body: &Value, assoc_tag: Option<&str>) {
    let Some(obj) = detail_object(body) else {
        debug!("Detail response is not an object; keeping search record");
        return;
    };

    if let Some(title) = first_string(obj, TITLE_FIELDS) {
        record.title = title;
    }
    if let Some(image) = first_string(obj, IMAGE_FIELDS) {
        record.image = image;
    }
    if let Some(price) = first_string(obj, PRICE_FIELDS) {
        record.price = price;
    }
    if let Some(url) = first_string(obj, URL_FIELDS) {
        record.url = match assoc_tag {
            Some(tag) => with_associate_tag(&url, tag),
            None => url,
        };
    }
    if let Some(rating) = first_string(obj, RATING_FIELDS) {
        record.rating = Some(rating);
    }
    if let Some(reviews) = first_string(obj, REVIEW_FIELDS) {
        record.review_count = Some(reviews);
    }
}

/// Review count from a reviews response: a reported total when one is
/// present, otherwise the number of reviews returned. `None` when neither
/// yields anything above zero.
pub fn review_count(body: &Value) -> Option<String> {
    let total = detail_object(body)
        .and_then(|obj| first_string(obj, REVIEW_TOTAL_FIELDS))
        .or_else(|| body.as_object().and_then(|obj| first_string(obj, REVIEW_TOTAL_FIELDS)))
        .filter(|t| t != "0");
    total.or_else(|| {
        super::shapes::extract_reviews(body)
            .map(Vec::len)
            .filter(|n| *n > 0)
            .map(|n| n.to_string())
    })
}
