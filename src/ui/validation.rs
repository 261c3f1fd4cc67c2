//! Input validation for product forms.
//!
//! Malformed input (a non-numeric price, an empty name) is turned into
//! field-level messages here so it never reaches the store.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::FieldErrors;

const MAX_NAME_LEN: usize = 150;
const MAX_QUANTITY_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 2000;

lazy_static! {
    /// Non-negative decimal with at most two fractional digits, e.g. 3, 3.5, 12.00
    static ref PRICE_REGEX: Regex = Regex::new(r"^(\d{1,9})(?:\.(\d{1,2}))?$").unwrap();
}

/// Product fields as typed into the form, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFormValues {
    pub name: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    pub in_stock: bool,
}

/// Product fields after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: String,
    pub in_stock: bool,
}

/// Parse a decimal price into cents
pub fn parse_price(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Price is required".to_string());
    }
    if raw.starts_with('-') {
        return Err("Price cannot be negative".to_string());
    }

    let caps = PRICE_REGEX
        .captures(raw)
        .ok_or_else(|| "Price must be a number with at most two decimals, e.g. 3.50".to_string())?;

    let whole: i64 = caps[1]
        .parse()
        .map_err(|_| "Price is too large".to_string())?;
    let fraction = match caps.get(2) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<i64>().unwrap_or(0) * 10,
        Some(m) => m.as_str().parse::<i64>().unwrap_or(0),
        None => 0,
    };

    Ok(whole * 100 + fraction)
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name is too long (max {} characters)", MAX_NAME_LEN));
    }
    Ok(())
}

fn validate_quantity(quantity: &str) -> Result<(), String> {
    if quantity.is_empty() {
        return Err("Quantity is required, e.g. 1kg or bundle".to_string());
    }
    if quantity.chars().count() > MAX_QUANTITY_LEN {
        return Err(format!(
            "Quantity is too long (max {} characters)",
            MAX_QUANTITY_LEN
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(format!(
            "Description is too long (max {} characters)",
            MAX_DESCRIPTION_LEN
        ));
    }
    Ok(())
}

/// Validate the text fields of a product form, collecting every problem
pub fn validate_product(values: &ProductFormValues) -> Result<ProductInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = values.name.trim();
    if let Err(e) = validate_name(name) {
        errors.add("name", e);
    }

    let quantity = values.quantity.trim();
    if let Err(e) = validate_quantity(quantity) {
        errors.add("quantity", e);
    }

    let description = values.description.trim();
    if let Err(e) = validate_description(description) {
        errors.add("description", e);
    }

    let price_cents = match parse_price(&values.price) {
        Ok(cents) => Some(cents),
        Err(e) => {
            errors.add("price", e);
            None
        }
    };

    match price_cents {
        Some(price_cents) if errors.is_empty() => Ok(ProductInput {
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            price_cents,
            quantity: quantity.to_string(),
            in_stock: values.in_stock,
        }),
        _ => Err(errors),
    }
}
