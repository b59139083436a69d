use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use kardex_infra::audit::StockAudit;
use kardex_infra::ledger::{LossReport, StockLevel};
use kardex_infra::store::Page;
use kardex_infra::transfer::{TransferReceipt, TransferRequest};
use kardex_inventory::{DeliveryGuide, MovementRequest, StockMovement, Warehouse};
use kardex_products::{Category, Product};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::Svc;

pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route(
            "/products/:sku",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/:sku/stock", get(get_stock).post(adjust_stock_to))
        .route("/products/:sku/movements", get(product_movements))
        .route("/products/:sku/audit", get(audit_product))
        .route("/categories", post(create_category).get(list_categories))
        .route("/movements", post(apply_movement))
        .route("/adjustments", post(create_adjustment))
        .route("/losses", post(register_loss).get(losses_report))
        .route("/transfers", post(transfer_stock))
        .route("/warehouses", get(list_warehouses))
        .route("/guides", get(list_guides))
        .route("/guides/:number", get(get_guide))
}

pub async fn create_product(
    Extension(services): Svc,
    Json(body): Json<dto::CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = services
        .catalog
        .create_product(body.product, body.initial_stock, body.responsible)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<Product>>> {
    let page = services
        .catalog
        .list_products(params.product_filter(), params.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get_product(Extension(services): Svc, Path(sku): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(services.catalog.product(&sku).await?))
}

pub async fn update_product(
    Extension(services): Svc,
    Path(sku): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    let product = services
        .catalog
        .update_product(&sku, body.changes, body.new_stock, body.responsible)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(Extension(services): Svc, Path(sku): Path<String>) -> ApiResult<StatusCode> {
    services.catalog.delete_product(&sku).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_stock(Extension(services): Svc, Path(sku): Path<String>) -> ApiResult<Json<StockLevel>> {
    Ok(Json(services.ledger.get_current_stock(&sku).await?))
}

pub async fn adjust_stock_to(
    Extension(services): Svc,
    Path(sku): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> ApiResult<Json<dto::StockAdjustmentResponse>> {
    let adjustment = services
        .ledger
        .adjust_stock_to(&sku, body.new_stock, body.notes, body.responsible)
        .await?;
    Ok(Json(dto::StockAdjustmentResponse::try_from(adjustment)?))
}

pub async fn product_movements(
    Extension(services): Svc,
    Path(sku): Path<String>,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<StockMovement>>> {
    Ok(Json(services.ledger.movements_for(&sku, params.pagination()).await?))
}

pub async fn audit_product(Extension(services): Svc, Path(sku): Path<String>) -> ApiResult<Json<StockAudit>> {
    Ok(Json(services.audit.audit_stock(&sku).await?))
}

pub async fn create_category(
    Extension(services): Svc,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = services.catalog.create_category(&body.name, body.description).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(Extension(services): Svc) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(services.catalog.categories().await?))
}

pub async fn apply_movement(
    Extension(services): Svc,
    Json(request): Json<MovementRequest>,
) -> ApiResult<(StatusCode, Json<dto::PostingResponse>)> {
    let posting = services.ledger.apply_movement(request).await?;
    Ok((StatusCode::CREATED, Json(dto::PostingResponse::try_from(posting)?)))
}

pub async fn create_adjustment(
    Extension(services): Svc,
    Json(body): Json<dto::InventoryAdjustmentRequest>,
) -> ApiResult<(StatusCode, Json<dto::PostingResponse>)> {
    let posting = services
        .ledger
        .create_inventory_adjustment(&body.sku, body.quantity_adjusted, body.reason, body.responsible)
        .await?;
    Ok((StatusCode::CREATED, Json(dto::PostingResponse::try_from(posting)?)))
}

pub async fn register_loss(
    Extension(services): Svc,
    Json(body): Json<dto::LossRequest>,
) -> ApiResult<(StatusCode, Json<dto::PostingResponse>)> {
    let posting = services
        .ledger
        .register_loss(&body.sku, body.quantity, body.loss_type, body.notes, body.responsible)
        .await?;
    Ok((StatusCode::CREATED, Json(dto::PostingResponse::try_from(posting)?)))
}

pub async fn losses_report(
    Extension(services): Svc,
    Query(query): Query<dto::LossQuery>,
) -> ApiResult<Json<LossReport>> {
    Ok(Json(services.ledger.losses_report(query.sku.as_deref()).await?))
}

pub async fn transfer_stock(
    Extension(services): Svc,
    Json(request): Json<TransferRequest>,
) -> ApiResult<(StatusCode, Json<TransferReceipt>)> {
    let receipt = services.transfers.transfer_stock(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_warehouses(Extension(services): Svc) -> ApiResult<Json<Vec<Warehouse>>> {
    Ok(Json(services.warehouses.active_warehouses().await?))
}

pub async fn list_guides(
    Extension(services): Svc,
    Query(params): Query<dto::ListParams>,
) -> ApiResult<Json<Page<DeliveryGuide>>> {
    Ok(Json(services.guides.list_guides(params.pagination()).await?))
}

pub async fn get_guide(Extension(services): Svc, Path(number): Path<String>) -> ApiResult<Json<DeliveryGuide>> {
    Ok(Json(services.guides.guide(&number).await?))
}
