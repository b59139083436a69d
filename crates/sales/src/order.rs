use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, impl_document};
use kardex_invoicing::{InvoiceLine, lines_total, validate_lines};
use kardex_parties::Customer;

/// Sales order status lifecycle: `PENDING → {INVOICED | CANCELLED}`, both final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Pending,
    Invoiced,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesLine {
    pub product_sku: String,
    pub quantity: i64,
    pub unit_price: Amount,
}

impl InvoiceLine for SalesLine {
    fn sku(&self) -> &str {
        &self.product_sku
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn unit_amount(&self) -> Amount {
        self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: DocumentId,
    pub order_number: String,
    pub customer_id: DocumentId,
    pub customer_name: String,
    pub date: DateTime<Utc>,
    pub items: Vec<SalesLine>,
    status: SalesOrderStatus,
    pub total_amount: Amount,
    pub delivery_branch_name: Option<String>,
    pub delivery_address: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(SalesOrder, "sales_orders", ["order_number"]);

impl SalesOrder {
    /// The delivery address is resolved from the customer's branches (see
    /// [`Customer::delivery_address`]).
    pub fn create(
        order_number: impl Into<String>,
        customer: &Customer,
        items: Vec<SalesLine>,
        delivery_branch_name: Option<String>,
        delivery_address: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_lines(&items)?;
        let resolved =
            customer.delivery_address(delivery_branch_name.as_deref(), delivery_address.as_deref())?;

        Ok(Self {
            id: DocumentId::new(),
            order_number: order_number.into(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            date: at,
            total_amount: lines_total(&items)?,
            items,
            status: SalesOrderStatus::Pending,
            delivery_branch_name,
            delivery_address: resolved,
            version: 0,
        })
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn ensure_pending(&self) -> DomainResult<()> {
        match self.status {
            SalesOrderStatus::Pending => Ok(()),
            other => Err(DomainError::validation(format!(
                "sales order {} is {other:?} and can no longer change",
                self.order_number
            ))),
        }
    }

    pub fn mark_invoiced(&mut self) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = SalesOrderStatus::Invoiced;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = SalesOrderStatus::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kardex_parties::{ContactInfo, CustomerBranch, NewCustomer};

    fn customer() -> Customer {
        Customer::create(
            NewCustomer {
                name: "Ferretería Central".into(),
                ruc: "20123456789".into(),
                contact: ContactInfo::default(),
                branches: vec![CustomerBranch::new("Lima", "Jr. Lima 1").main()],
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn line(sku: &str, quantity: i64, price: i64) -> SalesLine {
        SalesLine {
            product_sku: sku.into(),
            quantity,
            unit_price: Amount::from(price),
        }
    }

    #[test]
    fn create_resolves_delivery_address_from_main_branch() {
        let order = SalesOrder::create("OV24-0001", &customer(), vec![line("A", 2, 15)], None, None, Utc::now())
            .unwrap();
        assert_eq!(order.delivery_address.as_deref(), Some("Jr. Lima 1"));
        assert_eq!(order.total_amount, Amount::from(30));
    }

    #[test]
    fn unknown_branch_is_rejected() {
        let err = SalesOrder::create(
            "OV24-0001",
            &customer(),
            vec![line("A", 1, 1)],
            Some("Cusco".into()),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancelled_order_cannot_be_invoiced() {
        let mut order =
            SalesOrder::create("OV24-0001", &customer(), vec![line("A", 1, 1)], None, None, Utc::now()).unwrap();
        order.cancel().unwrap();
        assert!(matches!(order.mark_invoiced(), Err(DomainError::Validation(_))));
        assert!(order.cancel().is_err());
    }
}
