use kardex_core::{Amount, DomainError, DomainResult};

/// A priced line of an order, invoice or note.
pub trait InvoiceLine {
    fn sku(&self) -> &str;

    fn quantity(&self) -> i64;

    /// Unit cost (purchasing) or unit price (sales).
    fn unit_amount(&self) -> Amount;

    /// `quantity * unit_amount`, rounded.
    fn extension(&self) -> DomainResult<Amount> {
        self.unit_amount().times(self.quantity())
    }
}

/// Sum of line extensions.
pub fn lines_total<L: InvoiceLine>(lines: &[L]) -> DomainResult<Amount> {
    lines
        .iter()
        .try_fold(Amount::ZERO, |total, line| total.checked_add(line.extension()?))
}

/// At least one line; every SKU non-empty, quantity positive, unit amount not negative.
pub fn validate_lines<L: InvoiceLine>(lines: &[L]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("at least one line item is required"));
    }
    for line in lines {
        if line.sku().trim().is_empty() {
            return Err(DomainError::validation("line item SKU cannot be empty"));
        }
        if line.quantity() <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for {} must be greater than zero",
                line.sku()
            )));
        }
        if line.unit_amount().is_negative() {
            return Err(DomainError::validation(format!(
                "unit amount for {} cannot be negative",
                line.sku()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct Line(&'static str, i64, Amount);

    impl InvoiceLine for Line {
        fn sku(&self) -> &str {
            self.0
        }
        fn quantity(&self) -> i64 {
            self.1
        }
        fn unit_amount(&self) -> Amount {
            self.2
        }
    }

    #[test]
    fn total_sums_rounded_extensions() {
        let lines = [
            Line("A", 3, Amount::new(dec!(0.3335))),
            Line("B", 2, Amount::new(dec!(10.25))),
        ];
        // 3 * 0.334 = 1.002, 2 * 10.25 = 20.5
        assert_eq!(lines_total(&lines).unwrap().value(), dec!(21.502));
    }

    #[test]
    fn total_out_of_range_is_rejected() {
        let lines = [
            Line("A", i64::MAX, Amount::new(dec!(50000000000))),
            Line("B", 1, Amount::from(1)),
        ];
        assert!(matches!(lines_total(&lines), Err(DomainError::Validation(_))));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let lines = [Line("A", 0, Amount::from(1))];
        assert!(matches!(validate_lines(&lines), Err(DomainError::Validation(_))));
    }

    #[test]
    fn empty_lines_are_rejected() {
        let lines: [Line; 0] = [];
        assert!(validate_lines(&lines).is_err());
    }
}
