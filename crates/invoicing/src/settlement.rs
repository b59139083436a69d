//! Invoice settlement: what is owed, what was paid, and the resulting status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// PAID once `paid >= due`, PARTIAL while something but not all is paid.
    pub fn from_amounts(paid: Amount, due: Amount) -> Self {
        if paid >= due {
            PaymentStatus::Paid
        } else if paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Amount,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payment fields of an invoice, embedded (flattened) into it.
///
/// `total_amount` is what the invoice bills; debit notes raise it and
/// `debit_applied` records by how much. Credit notes lower
/// `amount_due = total_amount - credit_applied`. Always
/// `amount_paid <= amount_due <= total_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    total_amount: Amount,
    amount_paid: Amount,
    #[serde(default)]
    payments: Vec<Payment>,
    #[serde(default)]
    credit_applied: Amount,
    #[serde(default)]
    debit_applied: Amount,
    payment_status: PaymentStatus,
}

impl Settlement {
    pub fn new(total_amount: Amount) -> Self {
        Self {
            total_amount,
            amount_paid: Amount::ZERO,
            payments: Vec::new(),
            credit_applied: Amount::ZERO,
            debit_applied: Amount::ZERO,
            payment_status: PaymentStatus::from_amounts(Amount::ZERO, total_amount),
        }
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn amount_paid(&self) -> Amount {
        self.amount_paid
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn credit_applied(&self) -> Amount {
        self.credit_applied
    }

    pub fn debit_applied(&self) -> Amount {
        self.debit_applied
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn amount_due(&self) -> DomainResult<Amount> {
        self.total_amount.checked_sub(self.credit_applied)
    }

    /// What is still owed.
    pub fn outstanding(&self) -> DomainResult<Amount> {
        self.amount_due()?.checked_sub(self.amount_paid)
    }

    pub fn register_payment(
        &mut self,
        amount: Amount,
        date: DateTime<Utc>,
        notes: Option<String>,
    ) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if self.payment_status == PaymentStatus::Paid {
            return Err(DomainError::validation("invoice is already fully paid"));
        }
        let outstanding = self.outstanding()?;
        if amount > outstanding {
            return Err(DomainError::validation(format!(
                "payment {amount} exceeds outstanding balance {outstanding}"
            )));
        }

        let amount_paid = self.amount_paid.checked_add(amount)?;
        self.payments.push(Payment {
            amount,
            date,
            notes,
        });
        self.amount_paid = amount_paid;
        self.refresh_status()
    }

    /// Lower the amount due (credit note). Cannot exceed what is outstanding.
    pub fn apply_credit(&mut self, amount: Amount) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("credit amount must be positive"));
        }
        let outstanding = self.outstanding()?;
        if amount > outstanding {
            return Err(DomainError::validation(format!(
                "credit {amount} exceeds outstanding balance {outstanding}"
            )));
        }
        self.credit_applied = self.credit_applied.checked_add(amount)?;
        self.refresh_status()
    }

    /// Raise the invoice total, and with it the amount due (debit note).
    pub fn apply_debit(&mut self, amount: Amount) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("debit amount must be positive"));
        }
        let total_amount = self.total_amount.checked_add(amount)?;
        let debit_applied = self.debit_applied.checked_add(amount)?;
        self.total_amount = total_amount;
        self.debit_applied = debit_applied;
        self.refresh_status()
    }

    fn refresh_status(&mut self) -> DomainResult<()> {
        self.payment_status = PaymentStatus::from_amounts(self.amount_paid, self.amount_due()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn partial_then_paid() {
        let mut s = Settlement::new(Amount::from(100));
        assert_eq!(s.payment_status(), PaymentStatus::Pending);

        s.register_payment(Amount::from(40), now(), None).unwrap();
        assert_eq!(s.payment_status(), PaymentStatus::Partial);
        assert_eq!(s.outstanding().unwrap(), Amount::from(60));

        s.register_payment(Amount::from(60), now(), Some("saldo".into()))
            .unwrap();
        assert_eq!(s.payment_status(), PaymentStatus::Paid);
        assert_eq!(s.payments().len(), 2);
    }

    #[test]
    fn overpayment_is_rejected_without_side_effects() {
        let mut s = Settlement::new(Amount::from(100));
        s.register_payment(Amount::from(90), now(), None).unwrap();

        let err = s
            .register_payment(Amount::new(dec!(10.001)), now(), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(s.amount_paid(), Amount::from(90));
        assert_eq!(s.payments().len(), 1);
    }

    #[test]
    fn paying_a_paid_invoice_is_rejected() {
        let mut s = Settlement::new(Amount::from(10));
        s.register_payment(Amount::from(10), now(), None).unwrap();
        let err = s.register_payment(Amount::from(1), now(), None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let mut s = Settlement::new(Amount::from(10));
        assert!(s.register_payment(Amount::ZERO, now(), None).is_err());
        assert!(s.register_payment(Amount::from(-1), now(), None).is_err());
    }

    #[test]
    fn credit_reduces_amount_due_and_can_settle_the_invoice() {
        let mut s = Settlement::new(Amount::from(100));
        s.register_payment(Amount::from(70), now(), None).unwrap();
        s.apply_credit(Amount::from(30)).unwrap();

        assert_eq!(s.amount_due().unwrap(), Amount::from(70));
        assert_eq!(s.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn credit_beyond_outstanding_is_rejected() {
        let mut s = Settlement::new(Amount::from(100));
        s.register_payment(Amount::from(70), now(), None).unwrap();
        assert!(s.apply_credit(Amount::from(31)).is_err());
        assert_eq!(s.credit_applied(), Amount::ZERO);
    }

    #[test]
    fn debit_reopens_a_paid_invoice() {
        let mut s = Settlement::new(Amount::from(50));
        s.register_payment(Amount::from(50), now(), None).unwrap();
        s.apply_debit(Amount::from(5)).unwrap();

        assert_eq!(s.payment_status(), PaymentStatus::Partial);
        assert_eq!(s.outstanding().unwrap(), Amount::from(5));
        assert_eq!(s.total_amount(), Amount::from(55));
        assert_eq!(s.debit_applied(), Amount::from(5));

        // The raised total can be paid in full, and no further.
        s.register_payment(Amount::from(5), now(), None).unwrap();
        assert_eq!(s.payment_status(), PaymentStatus::Paid);
        assert_eq!(s.amount_paid(), s.total_amount());
        assert!(s.register_payment(Amount::from(1), now(), None).is_err());
    }

    #[test]
    fn debit_past_the_decimal_range_leaves_the_settlement_untouched() {
        let mut s = Settlement::new(Amount::new(Decimal::MAX));
        let err = s.apply_debit(Amount::from(1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(s.total_amount(), Amount::new(Decimal::MAX));
        assert_eq!(s.debit_applied(), Amount::ZERO);
    }

    #[test]
    fn flattened_fields_use_wire_names() {
        let s = Settlement::new(Amount::from(12));
        let body = serde_json::to_value(&s).unwrap();
        assert_eq!(body["payment_status"], serde_json::json!("PENDING"));
        assert_eq!(body["amount_paid"], serde_json::json!(0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// After any sequence of payments, credits and debits,
        /// paid <= due <= total and the status matches the amounts.
        #[test]
        fn paid_never_exceeds_total(
            total in 1i64..10_000_000,
            attempts in prop::collection::vec((0u8..3, -1_000i64..5_000_000), 1..30),
        ) {
            let total = Amount::new(Decimal::new(total, 3));
            let mut s = Settlement::new(total);
            for (kind, a) in attempts {
                let amount = Amount::new(Decimal::new(a, 3));
                let _ = match kind {
                    0 => s.register_payment(amount, Utc::now(), None),
                    1 => s.apply_credit(amount),
                    _ => s.apply_debit(amount),
                };
                let due = s.amount_due().unwrap();
                prop_assert!(s.amount_paid() <= due);
                prop_assert!(due <= s.total_amount());
                prop_assert_eq!(s.payment_status(), PaymentStatus::from_amounts(s.amount_paid(), due));
            }
        }
    }
}
