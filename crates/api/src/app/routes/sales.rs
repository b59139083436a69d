use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use kardex_infra::fulfillment::Fulfillment;
use kardex_infra::store::Page;
use kardex_infra::workflow::{CreditNoteOutcome, NewSalesOrder};
use kardex_parties::{Customer, CustomerBranch, NewCustomer};
use kardex_sales::{CreditNote, SalesInvoice, SalesOrder};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{Svc, parse_id};

pub fn router() -> Router {
    Router::new()
        .route("/customers", post(create_customer).get(list_customers))
        .route("/customers/by-ruc/:ruc", get(customer_by_ruc))
        .route("/customers/:id", get(get_customer))
        .route("/customers/:id/branches", post(add_branch).put(replace_branches))
        .route("/customers/:id/branches/:name/main", post(set_main_branch))
        .route("/customers/:id/branches/:name/activate", post(activate_branch))
        .route("/customers/:id/branches/:name/deactivate", post(deactivate_branch))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:number", get(get_order))
        .route("/orders/:number/invoice", post(invoice_order))
        .route("/orders/:number/cancel", post(cancel_order))
        .route("/invoices", get(list_invoices))
        .route("/invoices/:number", get(get_invoice))
        .route("/invoices/:number/payments", post(register_payment))
        .route("/invoices/:number/dispatch", post(dispatch_sale))
        .route(
            "/invoices/:number/credit-notes",
            post(create_credit_note).get(list_credit_notes),
        )
}

pub async fn create_customer(
    Extension(services): Svc,
    Json(body): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = services.parties.create_customer(body).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<Customer>>> {
    let page = services
        .parties
        .list_customers(params.search.as_deref(), params.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get_customer(Extension(services): Svc, Path(id): Path<String>) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.customer(parse_id(&id)?).await?))
}

pub async fn customer_by_ruc(Extension(services): Svc, Path(ruc): Path<String>) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.customer_by_ruc(&ruc).await?))
}

pub async fn add_branch(
    Extension(services): Svc,
    Path(id): Path<String>,
    Json(branch): Json<CustomerBranch>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.add_branch(parse_id(&id)?, branch).await?))
}

pub async fn replace_branches(
    Extension(services): Svc,
    Path(id): Path<String>,
    Json(branches): Json<Vec<CustomerBranch>>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.replace_branches(parse_id(&id)?, branches).await?))
}

pub async fn set_main_branch(
    Extension(services): Svc,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.set_main_branch(parse_id(&id)?, &name).await?))
}

pub async fn activate_branch(
    Extension(services): Svc,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.activate_branch(parse_id(&id)?, &name).await?))
}

pub async fn deactivate_branch(
    Extension(services): Svc,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services.parties.deactivate_branch(parse_id(&id)?, &name).await?))
}

pub async fn create_order(
    Extension(services): Svc,
    Json(body): Json<NewSalesOrder>,
) -> ApiResult<(StatusCode, Json<SalesOrder>)> {
    let order = services.sales.create_sales_order(body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<SalesOrder>>> {
    Ok(Json(services.sales.list_orders(params.pagination()).await?))
}

pub async fn get_order(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(services.sales.order(&number).await?))
}

pub async fn invoice_order(
    Extension(services): Svc,
    Path(number): Path<String>,
    body: Option<Json<dto::InvoiceOrderRequest>>,
) -> ApiResult<(StatusCode, Json<SalesInvoice>)> {
    let Json(body) = body.unwrap_or_default();
    let invoice = services.sales.invoice_order(&number, body.initial_payment).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn cancel_order(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<SalesOrder>> {
    Ok(Json(services.sales.cancel_order(&number).await?))
}

pub async fn list_invoices(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<SalesInvoice>>> {
    Ok(Json(services.sales.list_invoices(params.pagination()).await?))
}

pub async fn get_invoice(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<SalesInvoice>> {
    Ok(Json(services.sales.invoice(&number).await?))
}

pub async fn register_payment(
    Extension(services): Svc,
    Path(number): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> ApiResult<Json<SalesInvoice>> {
    let invoice = services
        .sales
        .register_payment(&number, body.amount, body.date, body.notes)
        .await?;
    Ok(Json(invoice))
}

pub async fn dispatch_sale(
    Extension(services): Svc,
    Path(number): Path<String>,
    body: Option<Json<dto::FulfillmentRequest>>,
) -> ApiResult<Json<Fulfillment<SalesInvoice>>> {
    let Json(body) = body.unwrap_or_default();
    let dispatched = services
        .sales
        .dispatch_sale(&number, body.notes, body.created_by)
        .await?;
    Ok(Json(dispatched))
}

pub async fn create_credit_note(
    Extension(services): Svc,
    Path(number): Path<String>,
    Json(body): Json<dto::CreditNoteRequest>,
) -> ApiResult<(StatusCode, Json<CreditNoteOutcome>)> {
    let outcome = services
        .sales
        .create_credit_note(&number, body.reason, body.items, body.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_credit_notes(
    Extension(services): Svc,
    Path(number): Path<String>,
) -> ApiResult<Json<Vec<CreditNote>>> {
    Ok(Json(services.sales.credit_notes_for(&number).await?))
}
