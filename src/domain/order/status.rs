use rust_decimal::Decimal;

use super::ledger::QuantityLedger;
use super::value_objects::OrderStatus;

/// Derive order status from ledger balances. Holds no state of its own,
/// so callers recompute it on every read.
pub fn resolve_status(ledger: &QuantityLedger) -> OrderStatus {
    let lines = ledger.lines();

    if lines.iter().all(|l| l.remaining_quantity() == Decimal::ZERO) {
        OrderStatus::Completed
    } else if lines.iter().all(|l| l.remaining_quantity() == l.ordered_quantity()) {
        OrderStatus::Pending
    } else {
        OrderStatus::PartiallyDispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::{DispatchLine, OrderLine, UnitType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ledger_with(quantities: &[Decimal]) -> QuantityLedger {
        let lines: Vec<OrderLine> = quantities
            .iter()
            .map(|q| OrderLine {
                product_id: Uuid::new_v4(),
                ordered_quantity: *q,
                unit_type: UnitType::SquareMeter,
                rate: dec!(1),
                discount: None,
                cash_rate: None,
            })
            .collect();
        QuantityLedger::new(&lines)
    }

    fn dispatch(ledger: &mut QuantityLedger, index: usize, quantity: Decimal) {
        let product_id = ledger.lines()[index].product_id();
        ledger.apply_deductions(&[DispatchLine::new(product_id, quantity)]).unwrap();
    }

    #[test]
    fn test_nothing_dispatched_is_pending() {
        let ledger = ledger_with(&[dec!(10)]);
        assert_eq!(resolve_status(&ledger), OrderStatus::Pending);
    }

    #[test]
    fn test_some_dispatched_is_partial() {
        let mut ledger = ledger_with(&[dec!(10)]);
        dispatch(&mut ledger, 0, dec!(6));
        assert_eq!(resolve_status(&ledger), OrderStatus::PartiallyDispatched);
    }

    #[test]
    fn test_everything_dispatched_is_completed() {
        let mut ledger = ledger_with(&[dec!(10)]);
        dispatch(&mut ledger, 0, dec!(10));
        assert_eq!(resolve_status(&ledger), OrderStatus::Completed);
    }

    #[test]
    fn test_one_line_done_other_untouched_is_partial() {
        let mut ledger = ledger_with(&[dec!(10), dec!(5)]);
        dispatch(&mut ledger, 1, dec!(5));
        assert_eq!(resolve_status(&ledger), OrderStatus::PartiallyDispatched);

        dispatch(&mut ledger, 0, dec!(10));
        assert_eq!(resolve_status(&ledger), OrderStatus::Completed);
    }
}
