use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Unit an order line is measured and billed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    SquareFeet,
    SquareMeter,
    Nos,
    Set,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::SquareFeet => "SQUARE_FEET",
            UnitType::SquareMeter => "SQUARE_METER",
            UnitType::Nos => "NOS",
            UnitType::Set => "SET",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product entry of an order, as placed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub ordered_quantity: Decimal,
    pub unit_type: UnitType,
    pub rate: Decimal,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub cash_rate: Option<Decimal>,
}

impl OrderLine {
    /// Unit rate after the line discount
    pub fn effective_rate(&self) -> Decimal {
        match self.discount {
            Some(discount) => self.rate * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED,
            None => self.rate,
        }
    }

    /// Billed value of `quantity` units of this line
    pub fn amount_for(&self, quantity: Decimal) -> Decimal {
        (quantity * self.effective_rate()).round_dp(2)
    }

    pub fn amount(&self) -> Decimal {
        self.amount_for(self.ordered_quantity)
    }
}

/// Derived fulfillment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyDispatched,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PartiallyDispatched => "PARTIALLY_DISPATCHED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested deduction: `quantity` units of the line for `product_id`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Unit the caller believes the line is measured in; checked when present
    #[serde(default)]
    pub unit_type: Option<UnitType>,
}

impl DispatchLine {
    pub fn new(product_id: Uuid, quantity: Decimal) -> Self {
        Self { product_id, quantity, unit_type: None }
    }

    pub fn with_unit(mut self, unit_type: UnitType) -> Self {
        self.unit_type = Some(unit_type);
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsDetails {
    #[serde(default)]
    pub transporter: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub lr_number: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Consignee / buyer / logistics data carried by a dispatch.
/// Allocation never looks inside it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMetadata {
    #[serde(default)]
    pub consignee: Option<Party>,
    #[serde(default)]
    pub buyer: Option<Party>,
    #[serde(default)]
    pub logistics: LogisticsDetails,
    #[serde(default)]
    pub apply_gst: bool,
}
