use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use kardex_infra::fulfillment::Fulfillment;
use kardex_infra::store::Page;
use kardex_infra::workflow::NewPurchaseOrder;
use kardex_parties::{NewSupplier, Supplier};
use kardex_purchasing::{DebitNote, PurchaseInvoice, PurchaseOrder};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::Svc;

pub fn router() -> Router {
    Router::new()
        .route("/suppliers", post(create_supplier).get(list_suppliers))
        .route("/suppliers/:name", get(get_supplier))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:number", get(get_order))
        .route("/orders/:number/invoice", post(invoice_order))
        .route("/orders/:number/cancel", post(cancel_order))
        .route("/orders/:number/receive", post(receive_order))
        .route("/invoices", get(list_invoices))
        .route("/invoices/:number", get(get_invoice))
        .route("/invoices/:number/payments", post(register_payment))
        .route("/invoices/:number/receive", post(receive_invoice))
        .route(
            "/invoices/:number/debit-notes",
            post(create_debit_note).get(list_debit_notes),
        )
}

pub async fn create_supplier(
    Extension(services): Svc,
    Json(body): Json<NewSupplier>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = services.parties.create_supplier(body).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<Supplier>>> {
    let page = services
        .parties
        .list_suppliers(params.search.as_deref(), params.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get_supplier(Extension(services): Svc, Path(name): Path<String>) -> ApiResult<Json<Supplier>> {
    Ok(Json(services.parties.supplier(&name).await?))
}

pub async fn create_order(
    Extension(services): Svc,
    Json(body): Json<NewPurchaseOrder>,
) -> ApiResult<(StatusCode, Json<PurchaseOrder>)> {
    let order = services.purchasing.create_purchase_order(body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<PurchaseOrder>>> {
    Ok(Json(services.purchasing.list_orders(params.pagination()).await?))
}

pub async fn get_order(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<PurchaseOrder>> {
    Ok(Json(services.purchasing.order(&number).await?))
}

pub async fn invoice_order(
    Extension(services): Svc,
    Path(number): Path<String>,
    body: Option<Json<dto::InvoiceOrderRequest>>,
) -> ApiResult<(StatusCode, Json<PurchaseInvoice>)> {
    let Json(body) = body.unwrap_or_default();
    let invoice = services
        .purchasing
        .invoice_order(&number, body.initial_payment)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn cancel_order(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<PurchaseOrder>> {
    Ok(Json(services.purchasing.cancel_order(&number).await?))
}

pub async fn receive_order(
    Extension(services): Svc,
    Path(number): Path<String>,
    body: Option<Json<dto::FulfillmentRequest>>,
) -> ApiResult<Json<Fulfillment<PurchaseOrder>>> {
    let Json(body) = body.unwrap_or_default();
    let received = services
        .purchasing
        .receive_purchase_order(&number, body.notes, body.created_by)
        .await?;
    Ok(Json(received))
}

pub async fn list_invoices(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<PurchaseInvoice>>> {
    Ok(Json(services.purchasing.list_invoices(params.pagination()).await?))
}

pub async fn get_invoice(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<PurchaseInvoice>> {
    Ok(Json(services.purchasing.invoice(&number).await?))
}

pub async fn register_payment(
    Extension(services): Svc,
    Path(number): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> ApiResult<Json<PurchaseInvoice>> {
    let invoice = services
        .purchasing
        .register_payment(&number, body.amount, body.date, body.notes)
        .await?;
    Ok(Json(invoice))
}

pub async fn receive_invoice(
    Extension(services): Svc,
    Path(number): Path<String>,
    body: Option<Json<dto::FulfillmentRequest>>,
) -> ApiResult<Json<Fulfillment<PurchaseInvoice>>> {
    let Json(body) = body.unwrap_or_default();
    let received = services
        .purchasing
        .receive_purchase(&number, body.notes, body.created_by)
        .await?;
    Ok(Json(received))
}

pub async fn create_debit_note(
    Extension(services): Svc,
    Path(number): Path<String>,
    Json(body): Json<dto::DebitNoteRequest>,
) -> ApiResult<(StatusCode, Json<dto::DebitNoteResponse>)> {
    let (debit_note, invoice) = services
        .purchasing
        .create_debit_note(&number, body.reason, body.items, body.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(dto::DebitNoteResponse { debit_note, invoice })))
}

pub async fn list_debit_notes(
    Extension(services): Svc,
    Path(number): Path<String>,
) -> ApiResult<Json<Vec<DebitNote>>> {
    Ok(Json(services.purchasing.debit_notes_for(&number).await?))
}
