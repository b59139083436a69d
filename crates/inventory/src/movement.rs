//! Stock movements: the immutable rows of the kardex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, impl_document};

/// Whether a movement adds units to or removes units from stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Direction implied by the sign of a stock delta. `None` for zero.
    pub fn from_delta(delta: i64) -> Option<Direction> {
        match delta.signum() {
            1 => Some(Direction::Inbound),
            -1 => Some(Direction::Outbound),
            _ => None,
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Direction::Inbound => 1,
            Direction::Outbound => -1,
        }
    }
}

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    TransferIn,
    TransferOut,
    LossDamaged,
    LossDefective,
    LossHumidity,
    LossExpired,
    LossTheft,
    LossOther,
}

impl MovementType {
    pub const LOSSES: [MovementType; 6] = [
        MovementType::LossDamaged,
        MovementType::LossDefective,
        MovementType::LossHumidity,
        MovementType::LossExpired,
        MovementType::LossTheft,
        MovementType::LossOther,
    ];

    /// Direction lookup table. `None` means the direction is chosen per
    /// movement (adjustments go either way).
    pub fn fixed_direction(self) -> Option<Direction> {
        match self {
            MovementType::In | MovementType::TransferIn => Some(Direction::Inbound),
            MovementType::Out
            | MovementType::TransferOut
            | MovementType::LossDamaged
            | MovementType::LossDefective
            | MovementType::LossHumidity
            | MovementType::LossExpired
            | MovementType::LossTheft
            | MovementType::LossOther => Some(Direction::Outbound),
            MovementType::Adjustment => None,
        }
    }

    pub fn is_loss(self) -> bool {
        Self::LOSSES.contains(&self)
    }

    /// Resolve the effective direction, validating an explicit one against the table.
    pub fn resolve_direction(self, explicit: Option<Direction>) -> DomainResult<Direction> {
        match (self.fixed_direction(), explicit) {
            (Some(fixed), None) => Ok(fixed),
            (Some(fixed), Some(given)) if fixed == given => Ok(fixed),
            (Some(fixed), Some(given)) => Err(DomainError::validation(format!(
                "{self:?} movements are {fixed:?}, not {given:?}"
            ))),
            (None, Some(given)) => Ok(given),
            (None, None) => Err(DomainError::validation(
                "adjustment movements need an explicit direction",
            )),
        }
    }
}

/// Immutable ledger entry. Quantity is always positive; `direction` carries the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: DocumentId,
    pub product_sku: String,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub direction: Direction,
    pub warehouse_id: Option<String>,
    pub target_warehouse_id: Option<String>,
    pub unit_cost: Amount,
    pub reference_document: Option<String>,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub responsible: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(StockMovement, "stock_movements");

impl StockMovement {
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.direction.sign()
    }

    /// `quantity * unit_cost`, rounded.
    pub fn total_cost(&self) -> DomainResult<Amount> {
        self.unit_cost.times(self.quantity)
    }
}

/// A request to post one movement against one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub sku: String,
    pub quantity: i64,
    pub movement_type: MovementType,
    /// Required for adjustments, optional (and checked) otherwise.
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub reference_document: Option<String>,
    /// Cost of the incoming lot. Drives revaluation on inbound movements.
    #[serde(default)]
    pub unit_cost: Option<Amount>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub target_warehouse_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
}

impl MovementRequest {
    pub fn new(sku: impl Into<String>, quantity: i64, movement_type: MovementType) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            movement_type,
            direction: None,
            reference_document: None,
            unit_cost: None,
            warehouse_id: None,
            target_warehouse_id: None,
            notes: None,
            responsible: None,
        }
    }

    /// An adjustment moving stock by `delta` (sign gives the direction).
    pub fn adjustment(sku: impl Into<String>, delta: i64) -> DomainResult<Self> {
        let direction = Direction::from_delta(delta)
            .ok_or_else(|| DomainError::validation("adjustment quantity cannot be zero"))?;
        Ok(Self::new(sku, delta.abs(), MovementType::Adjustment).direction(direction))
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_document = Some(reference.into());
        self
    }

    pub fn unit_cost(mut self, unit_cost: Amount) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn warehouse(mut self, warehouse_id: impl Into<String>) -> Self {
        self.warehouse_id = Some(warehouse_id.into());
        self
    }

    pub fn target_warehouse(mut self, warehouse_id: impl Into<String>) -> Self {
        self.target_warehouse_id = Some(warehouse_id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn responsible(mut self, responsible: Option<String>) -> Self {
        self.responsible = responsible;
        self
    }

    pub fn resolved_direction(&self) -> DomainResult<Direction> {
        self.movement_type.resolve_direction(self.direction)
    }
}
