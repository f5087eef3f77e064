use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::db::queries::notifications;
use crate::db::DbPool;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{page_response, parse_id, ListQuery};

pub async fn list_notifications(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.pagination();
    let unread_only = query.unread.unwrap_or(false);
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(notifications::list_for_user(&mut conn, user.user_id, unread_only, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

pub async fn mark_read(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "notification")?;
    let pool = pool.clone();
    let updated = web::block(move || -> ApiResult<usize> {
        let mut conn = pool.get()?;
        Ok(notifications::mark_read(&mut conn, user.user_id, id)?)
    })
    .await??;
    if updated == 0 {
        return Err(ApiError::not_found("notification"));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": id, "is_read": true })))
}

pub async fn mark_all_read(pool: web::Data<DbPool>, user: AuthUser) -> ApiResult<HttpResponse> {
    let pool = pool.clone();
    let updated = web::block(move || -> ApiResult<usize> {
        let mut conn = pool.get()?;
        Ok(notifications::mark_all_read(&mut conn, user.user_id)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}
