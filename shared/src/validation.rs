//! Validation utilities for the retail inventory ledger
//!
//! Structural checks on commands. These run before any storage work starts.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

// ============================================================================
// Line Validations
// ============================================================================

/// Validate that a document carries at least one line
pub fn validate_has_lines<T>(lines: &[T]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("At least one line item is required");
    }
    Ok(())
}

/// Largest quantity a single line may move
pub const MAX_LINE_QUANTITY: i64 = 1_000_000_000;

/// Largest amount stored in a `NUMERIC(18, 4)` money column
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999_999, 4)
}

/// Validate that a moved quantity is strictly positive and bounded
pub fn validate_line_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err("Quantity exceeds the supported range");
    }
    Ok(())
}

/// Validate a unit, cost or selling price
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if price > max_amount() {
        return Err("Price exceeds the supported range");
    }
    Ok(())
}

/// Sum of price times quantity, `None` on overflow
pub fn checked_total<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, i64)>,
{
    lines.into_iter().try_fold(Decimal::ZERO, |total, (price, quantity)| {
        price
            .checked_mul(Decimal::from(quantity))
            .and_then(|line| total.checked_add(line))
    })
}

/// Validate a document total computed with [`checked_total`]
pub fn validate_document_total(total: Option<Decimal>) -> Result<Decimal, &'static str> {
    match total {
        Some(total) if total <= max_amount() => Ok(total),
        _ => Err("Document total exceeds the supported range"),
    }
}

/// Validate a counted or received quantity (zero allowed)
pub fn validate_counted_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Counted quantity cannot be negative");
    }
    Ok(())
}

/// Validate a received quantity against what was ordered
pub fn validate_received_quantity(received: i64, ordered: i64) -> Result<(), &'static str> {
    validate_counted_quantity(received)?;
    if received > ordered {
        return Err("Received quantity cannot exceed ordered quantity");
    }
    Ok(())
}

/// Validate that every product appears at most once
pub fn validate_unique_products<I>(product_ids: I) -> Result<(), &'static str>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    for id in product_ids {
        if !seen.insert(id) {
            return Err("Each product may appear only once");
        }
    }
    Ok(())
}

// ============================================================================
// Document Validations
// ============================================================================

/// Validate that a transfer moves stock between two different warehouses
pub fn validate_distinct_warehouses(source: Uuid, dest: Uuid) -> Result<(), &'static str> {
    if source == dest {
        return Err("Source and destination warehouses must differ");
    }
    Ok(())
}

/// Validate SKU format: no surrounding or embedded whitespace
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.trim().is_empty() {
        return Err("SKU is required");
    }
    if sku.chars().any(char::is_whitespace) {
        return Err("SKU cannot contain whitespace");
    }
    Ok(())
}
