use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{LineRejection, RejectionReason};
use super::value_objects::{DispatchLine, OrderLine};

// ============================================================================
// Quantity Ledger
// ============================================================================
//
// Per-line record of ordered vs. dispatched quantity for one order.
// `remaining = ordered - dispatched` and 0 <= remaining <= ordered always holds:
// deductions are validated as a whole before any of them is applied.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLine {
    pub line: OrderLine,
    pub dispatched_quantity: Decimal,
}

impl LedgerLine {
    pub fn product_id(&self) -> Uuid {
        self.line.product_id
    }

    pub fn ordered_quantity(&self) -> Decimal {
        self.line.ordered_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.line.ordered_quantity - self.dispatched_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantityLedger {
    lines: Vec<LedgerLine>,
}

impl QuantityLedger {
    pub fn new(lines: &[OrderLine]) -> Self {
        Self {
            lines: lines
                .iter()
                .map(|line| LedgerLine {
                    line: line.clone(),
                    dispatched_quantity: Decimal::ZERO,
                })
                .collect(),
        }
    }

    /// Lines in placement order
    pub fn lines(&self) -> &[LedgerLine] {
        &self.lines
    }

    pub fn line(&self, product_id: Uuid) -> Option<&LedgerLine> {
        self.lines.iter().find(|l| l.product_id() == product_id)
    }

    pub fn remaining(&self, product_id: Uuid) -> Option<Decimal> {
        self.line(product_id).map(LedgerLine::remaining_quantity)
    }

    /// Remaining quantity of every line, in placement order
    pub fn remaining_by_line(&self) -> Vec<(Uuid, Decimal)> {
        self.lines
            .iter()
            .map(|l| (l.product_id(), l.remaining_quantity()))
            .collect()
    }

    pub fn total_ordered(&self) -> Decimal {
        self.lines.iter().map(LedgerLine::ordered_quantity).sum()
    }

    pub fn total_dispatched(&self) -> Decimal {
        self.lines.iter().map(|l| l.dispatched_quantity).sum()
    }

    pub fn total_remaining(&self) -> Decimal {
        self.lines.iter().map(LedgerLine::remaining_quantity).sum()
    }

    /// Validate a whole batch against current balances.
    /// Every failing line is reported, not just the first.
    pub fn check_deductions(&self, requests: &[DispatchLine]) -> Result<(), Vec<LineRejection>> {
        let mut rejections = Vec::new();
        let mut seen = HashSet::new();

        for request in requests {
            if !seen.insert(request.product_id) {
                rejections.push(LineRejection::new(request.product_id, RejectionReason::DuplicateLine));
                continue;
            }

            let Some(entry) = self.line(request.product_id) else {
                rejections.push(LineRejection::new(request.product_id, RejectionReason::UnknownLine));
                continue;
            };

            if let Some(unit_type) = request.unit_type {
                if unit_type != entry.line.unit_type {
                    rejections.push(LineRejection::new(
                        request.product_id,
                        RejectionReason::UnitMismatch {
                            expected: entry.line.unit_type,
                            requested: unit_type,
                        },
                    ));
                    continue;
                }
            }

            if request.quantity <= Decimal::ZERO {
                rejections.push(LineRejection::new(
                    request.product_id,
                    RejectionReason::NonPositiveQuantity { requested: request.quantity },
                ));
                continue;
            }

            let remaining = entry.remaining_quantity();
            if request.quantity > remaining {
                rejections.push(LineRejection::new(
                    request.product_id,
                    RejectionReason::ExceedsRemaining {
                        requested: request.quantity,
                        remaining,
                    },
                ));
            }
        }

        if rejections.is_empty() {
            Ok(())
        } else {
            Err(rejections)
        }
    }

    /// Deduct every requested quantity, or none of them
    pub fn apply_deductions(&mut self, requests: &[DispatchLine]) -> Result<(), Vec<LineRejection>> {
        self.check_deductions(requests)?;

        for request in requests {
            if let Some(entry) = self.lines.iter_mut().find(|l| l.product_id() == request.product_id) {
                entry.dispatched_quantity += request.quantity;
            }
        }

        Ok(())
    }

    /// Give back quantities of a dispatch that was rolled back.
    /// Clamped so a line never reports more than was ordered.
    pub fn restore(&mut self, lines: &[(Uuid, Decimal)]) {
        for (product_id, quantity) in lines {
            if let Some(entry) = self.lines.iter_mut().find(|l| l.product_id() == *product_id) {
                entry.dispatched_quantity = (entry.dispatched_quantity - *quantity).max(Decimal::ZERO);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::UnitType;
    use rust_decimal_macros::dec;

    fn order_line(quantity: Decimal) -> OrderLine {
        OrderLine {
            product_id: Uuid::new_v4(),
            ordered_quantity: quantity,
            unit_type: UnitType::Nos,
            rate: dec!(100),
            discount: None,
            cash_rate: None,
        }
    }

    #[test]
    fn test_new_ledger_has_full_remaining() {
        let lines = vec![order_line(dec!(10)), order_line(dec!(2.5))];
        let ledger = QuantityLedger::new(&lines);

        assert_eq!(ledger.remaining(lines[0].product_id), Some(dec!(10)));
        assert_eq!(ledger.remaining(lines[1].product_id), Some(dec!(2.5)));
        assert_eq!(ledger.total_ordered(), dec!(12.5));
        assert_eq!(ledger.total_remaining(), dec!(12.5));
        assert_eq!(ledger.total_dispatched(), Decimal::ZERO);
    }

    #[test]
    fn test_apply_deductions_reduces_exactly() {
        let lines = vec![order_line(dec!(10)), order_line(dec!(5))];
        let mut ledger = QuantityLedger::new(&lines);

        ledger
            .apply_deductions(&[
                DispatchLine::new(lines[0].product_id, dec!(6)),
                DispatchLine::new(lines[1].product_id, dec!(5)),
            ])
            .unwrap();

        assert_eq!(ledger.remaining(lines[0].product_id), Some(dec!(4)));
        assert_eq!(ledger.remaining(lines[1].product_id), Some(dec!(0)));
    }

    #[test]
    fn test_one_bad_line_leaves_every_line_untouched() {
        let lines = vec![order_line(dec!(10)), order_line(dec!(3))];
        let mut ledger = QuantityLedger::new(&lines);
        let before = ledger.clone();

        let result = ledger.apply_deductions(&[
            DispatchLine::new(lines[0].product_id, dec!(2)),
            DispatchLine::new(lines[1].product_id, dec!(4)),
        ]);

        let rejections = result.unwrap_err();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].product_id, lines[1].product_id);
        assert_eq!(
            rejections[0].reason,
            RejectionReason::ExceedsRemaining { requested: dec!(4), remaining: dec!(3) }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_all_failing_lines_are_reported() {
        let lines = vec![order_line(dec!(10))];
        let ledger = QuantityLedger::new(&lines);
        let stranger = Uuid::new_v4();

        let rejections = ledger
            .check_deductions(&[
                DispatchLine::new(lines[0].product_id, dec!(0)),
                DispatchLine::new(stranger, dec!(1)),
                DispatchLine::new(lines[0].product_id, dec!(1)),
            ])
            .unwrap_err();

        assert_eq!(rejections.len(), 3);
        assert_eq!(
            rejections[0].reason,
            RejectionReason::NonPositiveQuantity { requested: dec!(0) }
        );
        assert_eq!(rejections[1], LineRejection::new(stranger, RejectionReason::UnknownLine));
        assert_eq!(rejections[2].reason, RejectionReason::DuplicateLine);
    }

    #[test]
    fn test_unit_mismatch_is_rejected() {
        let lines = vec![order_line(dec!(10))];
        let ledger = QuantityLedger::new(&lines);

        let rejections = ledger
            .check_deductions(&[DispatchLine::new(lines[0].product_id, dec!(1)).with_unit(UnitType::Set)])
            .unwrap_err();

        assert_eq!(
            rejections[0].reason,
            RejectionReason::UnitMismatch { expected: UnitType::Nos, requested: UnitType::Set }
        );
    }

    #[test]
    fn test_negative_quantity_cannot_inflate_remaining() {
        let lines = vec![order_line(dec!(10))];
        let mut ledger = QuantityLedger::new(&lines);

        assert!(ledger
            .apply_deductions(&[DispatchLine::new(lines[0].product_id, dec!(-3))])
            .is_err());
        assert_eq!(ledger.remaining(lines[0].product_id), Some(dec!(10)));
    }

    #[test]
    fn test_restore_returns_quantities() {
        let lines = vec![order_line(dec!(10))];
        let mut ledger = QuantityLedger::new(&lines);
        let product_id = lines[0].product_id;

        ledger.apply_deductions(&[DispatchLine::new(product_id, dec!(7))]).unwrap();
        ledger.restore(&[(product_id, dec!(7))]);
        assert_eq!(ledger.remaining(product_id), Some(dec!(10)));

        ledger.restore(&[(product_id, dec!(1))]);
        assert_eq!(ledger.remaining(product_id), Some(dec!(10)));
    }
}
