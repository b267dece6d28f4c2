//! Time partition of a parent order into child slices

use rust_decimal::Decimal;
use std::time::Duration;
use tranche_core::{OrderSpec, Quantity, SymbolFilters, ValidationError, ValidationResult};

/// One child order due at `offset` from the start of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSlice {
    pub index: usize,
    pub offset: Duration,
    pub child: OrderSpec,
}

/// Ordered sequence of child orders. Built once at the start of a run.
///
/// The child quantities sum exactly to the parent quantity: every slice but
/// the last is `total / n` floored to the step size, and the last slice takes
/// what remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    total_quantity: Quantity,
    interval: Duration,
    slices: Vec<PlannedSlice>,
}

impl SlicePlan {
    pub fn build(
        template: &OrderSpec,
        total_quantity: Quantity,
        duration: Duration,
        slice_count: usize,
        filters: &SymbolFilters,
    ) -> ValidationResult<Self> {
        if slice_count == 0 {
            return Err(ValidationError::InvalidSliceCount(slice_count));
        }
        let divisor =
            u32::try_from(slice_count).map_err(|_| ValidationError::InvalidSliceCount(slice_count))?;
        if total_quantity <= Decimal::ZERO {
            return Err(ValidationError::QuantityTooSmall {
                quantity: total_quantity,
                min: filters.min_qty,
            });
        }

        let per_slice = filters.floor_quantity(total_quantity / Decimal::from(slice_count));
        if per_slice <= Decimal::ZERO || per_slice < filters.min_qty {
            return Err(ValidationError::SliceTooSmall {
                per_slice,
                min: filters.min_qty,
            });
        }
        let last = total_quantity - per_slice * Decimal::from(slice_count - 1);

        let interval = duration / divisor;
        let slices = (0..slice_count)
            .map(|index| {
                let quantity = if index + 1 == slice_count { last } else { per_slice };
                PlannedSlice {
                    index,
                    // index < slice_count, which fits in u32
                    offset: interval * index as u32,
                    child: template.clone().with_quantity(quantity.normalize()),
                }
            })
            .collect();

        Ok(Self {
            total_quantity,
            interval,
            slices,
        })
    }

    pub fn slices(&self) -> &[PlannedSlice] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn planned_quantity(&self) -> Quantity {
        self.slices.iter().map(|s| s.child.quantity()).sum()
    }
}
