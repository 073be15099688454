//! Tiered process pricing.
//!
//! Pure functions: resolve a process's unit price from its thickness tiers,
//! scale it into a line contribution by price type, and aggregate per item
//! and per document. No store access; callers pass the process and
//! inventory snapshots they already hold.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Dimensions, InventoryItem, LineItem, PriceType, Process, QuoteTotals,
};

/// Where a process step hangs: on a product's material row or directly on a
/// service line. Only the `hour` price type cares (see [`line_contribution`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepScope {
    Material,
    Item,
}

/// Unit price of `process` for the given glass thickness.
///
/// A tiered process requires a positive thickness: without one the result
/// is zero, not the base price, because tiers have no flat fallback. An
/// exact tier match wins; otherwise the tier nearest to the given thickness
/// applies, ties breaking toward the thicker tier (conservative estimate).
pub fn resolve_unit_price(process: &Process, glass_thickness_mm: Option<Decimal>) -> Decimal {
    if process.thickness_tiers.is_empty() {
        return process.base_price;
    }
    let thickness = match glass_thickness_mm {
        Some(t) if t > Decimal::ZERO => t,
        _ => return Decimal::ZERO,
    };

    let mut best: Option<&crate::models::ThicknessTier> = None;
    for tier in &process.thickness_tiers {
        best = match best {
            None => Some(tier),
            Some(current) => {
                let current_gap = (current.thickness_mm - thickness).abs();
                let tier_gap = (tier.thickness_mm - thickness).abs();
                if tier_gap < current_gap
                    || (tier_gap == current_gap && tier.thickness_mm > current.thickness_mm)
                {
                    Some(tier)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.map(|tier| tier.price).unwrap_or(Decimal::ZERO)
}

/// Amount one process step adds to a line.
///
/// `hour` is asymmetric on purpose, preserved from long-standing workshop
/// practice: a material-level step bills a flat `unit_price` per line, while
/// a service-level step bills `unit_price × quantity`. Default processes
/// are pre-bundled into the product base price and contribute nothing.
pub fn line_contribution(
    process: &Process,
    unit_price: Decimal,
    dimensions: &Dimensions,
    quantity: Decimal,
    scope: StepScope,
) -> Decimal {
    if process.is_default {
        return Decimal::ZERO;
    }
    match process.price_type {
        PriceType::SquareMeter => unit_price * dimensions.area_m2 * quantity,
        PriceType::LinearMeter => unit_price * dimensions.perimeter_m() * quantity,
        PriceType::Piece => unit_price * quantity,
        PriceType::Hour => match scope {
            StepScope::Material => unit_price,
            StepScope::Item => unit_price * quantity,
        },
    }
}

/// Total process cost of one line: material-level steps (tier-resolved
/// against the material's glass thickness) plus service-level steps
/// (resolved without a thickness).
pub fn item_process_cost(
    item: &LineItem,
    processes: &[Process],
    inventory: &[InventoryItem],
) -> Decimal {
    let by_process: HashMap<Uuid, &Process> = processes.iter().map(|p| (p.id, p)).collect();
    let by_item: HashMap<Uuid, &InventoryItem> = inventory.iter().map(|i| (i.id, i)).collect();

    let mut total = Decimal::ZERO;

    for material in &item.materials {
        let thickness = by_item
            .get(&material.inventory_item_id)
            .and_then(|inv| inv.glass_thickness_mm);
        for step in &material.process_steps {
            if let Some(process) = by_process.get(&step.process_id) {
                let unit_price = resolve_unit_price(process, thickness);
                total += line_contribution(
                    process,
                    unit_price,
                    &item.dimensions,
                    item.quantity,
                    StepScope::Material,
                );
            }
        }
    }

    for step in &item.process_steps {
        if let Some(process) = by_process.get(&step.process_id) {
            let unit_price = resolve_unit_price(process, None);
            total += line_contribution(
                process,
                unit_price,
                &item.dimensions,
                item.quantity,
                StepScope::Item,
            );
        }
    }

    total
}

/// Recompute document totals from items. The invariant enforced here:
/// `grand_total = (product_amount + process_amount) × (1 + vat_rate/100)`,
/// never edited independently.
pub fn document_totals(
    items: &[LineItem],
    processes: &[Process],
    inventory: &[InventoryItem],
    vat_rate: Decimal,
) -> QuoteTotals {
    let product_amount: Decimal = items.iter().map(|item| item.product_amount()).sum();
    let process_amount: Decimal = items
        .iter()
        .map(|item| item_process_cost(item, processes, inventory))
        .sum();
    let net = product_amount + process_amount;
    let vat_amount = net * vat_rate / Decimal::ONE_HUNDRED;

    QuoteTotals {
        product_amount,
        process_amount,
        vat_rate,
        vat_amount,
        grand_total: net + vat_amount,
    }
}
