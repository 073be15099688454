use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// One process applied to a material or to a service line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub process_id: Uuid,
    pub status: StepStatus,
    pub notes: Option<String>,
}

impl ProcessStep {
    pub fn new(process_id: Uuid) -> Self {
        Self {
            process_id,
            status: StepStatus::Pending,
            notes: None,
        }
    }
}

/// A stocked material consumed by a product line, with its process steps.
///
/// `quantity` is per unit of the owning line item; issuing a work order
/// deducts `quantity × item.quantity` from the referenced inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialUsage {
    pub inventory_item_id: Uuid,
    pub quantity: Decimal,
    pub process_steps: Vec<ProcessStep>,
}

/// Physical dimensions of a glass line. Width and height are stored in
/// millimeters, area in square meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_mm: Decimal,
    pub height_mm: Decimal,
    pub area_m2: Decimal,
}

impl Dimensions {
    /// Perimeter in meters: `2 × (width + height) / 1000`.
    pub fn perimeter_m(&self) -> Decimal {
        Decimal::TWO * (self.width_mm + self.height_mm) / Decimal::from(1000)
    }
}

/// One line of a quote or work order.
///
/// Product lines carry `product_id` plus `materials` (each material has its
/// own process steps). Service lines carry `service_id` plus item-level
/// `process_steps` and no materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub quantity: Decimal,
    pub dimensions: Dimensions,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub materials: Vec<MaterialUsage>,
    pub process_steps: Vec<ProcessStep>,
}

impl LineItem {
    pub fn is_service(&self) -> bool {
        self.service_id.is_some()
    }

    /// Product amount of the line: dimensioned lines price by area, the
    /// rest by piece.
    pub fn product_amount(&self) -> Decimal {
        if self.dimensions.area_m2 > Decimal::ZERO {
            self.unit_price * self.dimensions.area_m2 * self.quantity
        } else {
            self.unit_price * self.quantity
        }
    }
}
