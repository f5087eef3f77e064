use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use nsccore::plans::{self, Plan, MAX_ROI_PAYMENTS};
use nsccore::roi;
use nsccore::types::{Network, PaymentPurpose};
use nsccore::validate;

use crate::auth::AuthUser;
use crate::db::queries::{packages, users};
use crate::db::{DbPool, PaymentRequest};
use crate::error::{ApiError, ApiResult};
use crate::handlers::account::submit_payment;
use crate::handlers::{page_response, ListQuery};

#[derive(Debug, Serialize)]
struct PlanView {
    #[serde(flatten)]
    plan: Plan,
    max_roi_payments: i32,
    /// Total ROI at the plan minimum over the full schedule
    min_total_return_cents: i64,
}

pub async fn list_plans() -> ApiResult<HttpResponse> {
    let views = plans::all()
        .iter()
        .map(|plan| -> ApiResult<PlanView> {
            Ok(PlanView {
                plan: *plan,
                max_roi_payments: MAX_ROI_PAYMENTS,
                min_total_return_cents: roi::total_return(
                    plan.min_cents,
                    plan.monthly_roi_bps,
                    MAX_ROI_PAYMENTS,
                )?,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(HttpResponse::Ok().json(views))
}

pub async fn list_packages(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(packages::list_for_user(&mut conn, user.user_id, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub plan_code: String,
    pub amount_cents: i64,
    pub network: Network,
    pub tx_hash: String,
}

/// Submit a package payment; the package starts once an admin approves it
pub async fn purchase(
    pool: web::Data<DbPool>,
    user: AuthUser,
    body: web::Json<PurchaseRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let plan = plans::validate_investment(body.plan_code.trim(), body.amount_cents)?;
    let tx_hash = validate::tx_hash(body.network, &body.tx_hash)?;
    let pool = pool.clone();

    let request = web::block(move || -> ApiResult<PaymentRequest> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        if !record.bot_active {
            return Err(ApiError::Forbidden(
                "activate your bot before purchasing a package".to_string(),
            ));
        }
        submit_payment(
            &mut conn,
            user.user_id,
            PaymentPurpose::Package,
            body.amount_cents,
            body.network,
            tx_hash,
            Some(plan.code.to_string()),
        )
    })
    .await??;

    tracing::info!(
        "Package payment {} ({}, {}) submitted by {}",
        request.id,
        plan.code,
        request.amount_cents,
        user.user_id
    );
    Ok(HttpResponse::Created().json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_plans_listed_in_order() {
        let app = test::init_service(
            App::new().route("/api/packages/plans", web::get().to(list_plans)),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/packages/plans").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let plans = body.as_array().unwrap();
        assert_eq!(plans.len(), 5);
        assert_eq!(plans[0]["code"], "bronze");
        assert_eq!(plans[0]["monthly_roi_bps"], 400);
        // $100 at 4% for 12 months
        assert_eq!(plans[0]["min_total_return_cents"], 4_800);
        assert_eq!(plans[4]["code"], "diamond");
    }
}
