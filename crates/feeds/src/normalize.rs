//! Mapping raw provider products onto price observations.
//!
//! Field names and value formats differ between retailers and scraper
//! configurations, so every field is looked up under several aliases and
//! parsed leniently. Anything that still cannot be read as a price is
//! rejected instead of being stored as zero.

use chrono::{DateTime, Utc};
use pricewatch_core::{
    Availability, Currency, Price, PriceObservation, ProductId, ProductTarget, ValidationError,
};
use serde_json::{Map, Value};
use url::Url;

const NAME_FIELDS: [&str; 3] = ["product_name", "name", "title"];
const PRICE_FIELDS: [&str; 3] = ["current_price", "price", "product_price"];
const ORIGINAL_PRICE_FIELDS: [&str; 3] = ["original_price", "list_price", "was_price"];
const CURRENCY_FIELDS: [&str; 2] = ["currency", "product_currency"];
const AVAILABILITY_FIELDS: [&str; 3] = ["in_stock", "availability_status", "availability"];
const URL_FIELDS: [&str; 3] = ["product_url", "url", "link"];

const UNAVAILABLE_KEYWORDS: [&str; 4] = ["out of stock", "unavailable", "sold out", "not available"];
const AVAILABLE_KEYWORDS: [&str; 4] = ["in stock", "available", "add to cart", "buy now"];
/// Listing badges such as "In 50+ people's carts" imply the item can be bought.
const DEMAND_KEYWORDS: [&str; 3] = ["people's carts", "bought since", "bought in"];
const CHANNEL_AVAILABLE_KEYWORDS: [&str; 3] = ["available", "in stock", "ready"];

/// Stripped from price strings before parsing. Longer codes come first.
const PRICE_NOISE: [&str; 8] = ["USD", "EUR", "GBP", "US", "$", "€", "£", "¥"];

const UNKNOWN_NAME: &str = "Unknown";

/// Normalize every product returned for one target.
pub fn normalize_batch(
    raw: Vec<Value>,
    target: &ProductTarget,
    observed_at: DateTime<Utc>,
) -> Vec<Result<PriceObservation, ValidationError>> {
    raw.into_iter()
        .map(|product| normalize_product(product, target, observed_at))
        .collect()
}

/// Normalize one raw product scraped from `target`.
///
/// A product is identified by its own URL with query and fragment removed,
/// resolved against the target URL when relative. A product without a URL is
/// identified by the target URL, whatever else the page returned.
pub fn normalize_product(
    raw: Value,
    target: &ProductTarget,
    observed_at: DateTime<Utc>,
) -> Result<PriceObservation, ValidationError> {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let product = match first_field(fields, &URL_FIELDS).and_then(Value::as_str) {
        Some(link) => {
            ProductId::new(&target.retailer, &canonical_url(&resolve_url(link, &target.url)))?
        }
        None => target.id()?,
    };

    let name = first_field(fields, &NAME_FIELDS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_NAME);

    let current_price = first_field(fields, &PRICE_FIELDS)
        .ok_or(ValidationError::MissingField("current_price"))
        .and_then(parse_price)?;
    let original_price = first_field(fields, &ORIGINAL_PRICE_FIELDS).and_then(|v| parse_price(v).ok());
    let currency = match first_field(fields, &CURRENCY_FIELDS).and_then(Value::as_str) {
        Some(code) => parse_currency(code)?,
        None => Currency::default(),
    };

    let observation = PriceObservation::new(product, name, observed_at, current_price, currency)
        .with_category(target.category.clone())
        .with_original_price(original_price)
        .with_availability(parse_availability(fields))
        .with_raw_payload(raw.clone());
    observation.validate()?;
    Ok(observation)
}

/// First alias holding a non-null, non-blank value.
fn first_field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match fields.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    })
}

/// Parse a price given as a number or as text like `"$1,249.00"`.
pub fn parse_price(value: &Value) -> Result<Price, ValidationError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| ValidationError::UnparseablePrice(number.to_string()))
            .and_then(Price::from_f64),
        Value::String(text) => {
            let mut cleaned = text.trim().to_string();
            for noise in PRICE_NOISE {
                cleaned = cleaned.replace(noise, "");
            }
            normalize_separators(cleaned.trim())
                .parse::<f64>()
                .map_err(|_| ValidationError::UnparseablePrice(text.clone()))
                .and_then(Price::from_f64)
        }
        other => Err(ValidationError::UnparseablePrice(other.to_string())),
    }
}

/// Rewrite digit grouping into a plain decimal number.
///
/// A comma followed by exactly two trailing digits is a decimal comma
/// (`19,99`, `1.249,50`); any other comma groups thousands (`1,249.50`).
fn normalize_separators(amount: &str) -> String {
    if let Some(pos) = amount.rfind(',') {
        let cents = &amount[pos + 1..];
        if cents.len() == 2 && cents.bytes().all(|b| b.is_ascii_digit()) {
            let whole = amount[..pos].replace(['.', ' '], "");
            return format!("{}.{}", whole, cents);
        }
    }
    amount.replace(',', "")
}

/// Map a currency symbol or code onto a three-letter code.
pub fn parse_currency(value: &str) -> Result<Currency, ValidationError> {
    match value.trim().to_lowercase().as_str() {
        "$" | "us$" => Ok(Currency::USD),
        "€" => Ok(Currency::EUR),
        "£" => Ok(Currency::GBP),
        "¥" => Ok(Currency::JPY),
        _ => Currency::new(value),
    }
}

/// Read the stock status from the first availability field present.
pub fn parse_availability(fields: &Map<String, Value>) -> Availability {
    let Some(value) = first_field(fields, &AVAILABILITY_FIELDS) else {
        return Availability::Unknown;
    };

    match value {
        Value::Bool(in_stock) => Availability::from(*in_stock),
        Value::String(text) => availability_from_text(text),
        Value::Object(channels) if !channels.is_empty() => {
            let any_available = channels.values().any(|status| match status {
                Value::Bool(available) => *available,
                Value::String(text) => {
                    let lowered = text.trim().to_lowercase();
                    !contains_any(&lowered, &UNAVAILABLE_KEYWORDS)
                        && contains_any(&lowered, &CHANNEL_AVAILABLE_KEYWORDS)
                }
                _ => false,
            });
            Availability::from(any_available)
        }
        _ => Availability::Unknown,
    }
}

fn availability_from_text(text: &str) -> Availability {
    let lowered = text.trim().to_lowercase();
    // "unavailable" contains "available"
    if contains_any(&lowered, &UNAVAILABLE_KEYWORDS) {
        Availability::OutOfStock
    } else if contains_any(&lowered, &AVAILABLE_KEYWORDS) || contains_any(&lowered, &DEMAND_KEYWORDS)
    {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Resolve a possibly relative product link against the scraped page.
pub fn resolve_url(link: &str, base: &str) -> String {
    let link = link.trim();
    if Url::parse(link).is_ok() {
        return link.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(link))
        .map(String::from)
        .unwrap_or_else(|_| link.to_string())
}

/// Drop tracking query strings and fragments from a product link.
fn canonical_url(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => link.to_string(),
    }
}
