use axum::{Extension, Json};

use kardex_infra::audit::StaleFulfillment;

use crate::app::errors::ApiResult;
use crate::app::routes::common::Svc;

pub async fn stale_fulfillments(Extension(services): Svc) -> ApiResult<Json<Vec<StaleFulfillment>>> {
    Ok(Json(services.audit.stale_fulfillments().await?))
}
