use anyhow::Result;
use serde_json::{json, Value};
use uuid::Uuid;

use nsccore::email::format_usd;
use nsccore::validate::Page;

use crate::modules::client::ApiClient;

fn field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or("-")
}

fn cents(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_i64)
        .map(format_usd)
        .unwrap_or_else(|| "-".to_string())
}

/// Status filter value that lists every status
pub const ALL_STATUSES: &str = "all";

fn page_query(status: &Option<String>, page: i64, limit: i64) -> Vec<(&'static str, String)> {
    let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
    if let Some(status) = status.as_deref().filter(|s| !s.eq_ignore_ascii_case(ALL_STATUSES)) {
        query.push(("status", status.to_string()));
    }
    query
}

fn print_footer(page: &Page<Value>) {
    println!(
        "page {}/{} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
}

fn note_body(note: Option<String>) -> Value {
    match note {
        Some(note) => json!({ "note": note }),
        None => json!({}),
    }
}

pub async fn stats(client: &ApiClient) -> Result<()> {
    let stats: Value = client.get("admin/stats", &[]).await?;
    let count = |key: &str| stats.get(key).and_then(Value::as_i64).unwrap_or(0);

    println!("users               {}", count("total_users"));
    println!("active bots         {}", count("active_bots"));
    println!("active packages     {}", count("active_packages"));
    println!("invested            {}", cents(&stats, "total_invested_cents"));
    println!("ROI paid            {}", cents(&stats, "total_roi_paid_cents"));
    println!("commissions paid    {}", cents(&stats, "total_commissions_cents"));
    println!("withdrawn           {}", cents(&stats, "total_withdrawn_cents"));
    println!("user balances       {}", cents(&stats, "total_balances_cents"));
    println!("pending payments    {}", count("pending_payments"));
    println!("pending withdrawals {}", count("pending_withdrawals"));
    println!("pending KYC         {}", count("pending_kyc"));
    Ok(())
}

pub async fn run_roi(client: &ApiClient) -> Result<()> {
    let outcome: Value = client.post("admin/roi/run", &json!({})).await?;
    match field(&outcome, "status") {
        "skipped" => tracing::warn!("ROI run skipped: another run holds the lock"),
        _ => tracing::info!(
            "✅ ROI run done: {} paid, {} completed, {} failed, {} total",
            outcome.get("processed").and_then(serde_json::Value::as_u64).unwrap_or(0),
            outcome.get("completed").and_then(serde_json::Value::as_u64).unwrap_or(0),
            outcome.get("failed").and_then(serde_json::Value::as_u64).unwrap_or(0),
            cents(&outcome, "total_paid_cents")
        ),
    }
    Ok(())
}

pub async fn payments(client: &ApiClient, status: Option<String>, page: i64, limit: i64) -> Result<()> {
    let list: Page<Value> = client.get("admin/payments", &page_query(&status, page, limit)).await?;
    for p in &list.items {
        println!(
            "{}  {:<8}  {:<14}  {:>12}  {:<5}  {}  {}",
            field(p, "id"),
            field(p, "status"),
            field(p, "purpose"),
            cents(p, "amount_cents"),
            field(p, "network"),
            field(p, "plan_code"),
            field(p, "tx_hash"),
        );
    }
    print_footer(&list);
    Ok(())
}

pub async fn approve_payment(client: &ApiClient, id: Uuid) -> Result<()> {
    let resp: Value = client.post(&format!("admin/payments/{id}/approve"), &json!({})).await?;
    tracing::info!("✅ Payment {} approved", id);
    println!("{}", serde_json::to_string_pretty(&resp["activation"])?);
    Ok(())
}

pub async fn reject_payment(client: &ApiClient, id: Uuid, note: Option<String>) -> Result<()> {
    let _: Value = client.post(&format!("admin/payments/{id}/reject"), &note_body(note)).await?;
    tracing::info!("Payment {} rejected", id);
    Ok(())
}

pub async fn withdrawals(client: &ApiClient, status: Option<String>, page: i64, limit: i64) -> Result<()> {
    let list: Page<Value> = client.get("admin/withdrawals", &page_query(&status, page, limit)).await?;
    for w in &list.items {
        println!(
            "{}  {:<9}  {:>12}  net {:>12}  {:<5}  {}",
            field(w, "id"),
            field(w, "status"),
            cents(w, "amount_cents"),
            cents(w, "net_amount_cents"),
            field(w, "network"),
            field(w, "wallet_address"),
        );
    }
    print_footer(&list);
    Ok(())
}

pub async fn approve_withdrawal(client: &ApiClient, id: Uuid) -> Result<()> {
    let _: Value = client.post(&format!("admin/withdrawals/{id}/approve"), &json!({})).await?;
    tracing::info!("✅ Withdrawal {} approved", id);
    Ok(())
}

pub async fn reject_withdrawal(client: &ApiClient, id: Uuid, note: Option<String>) -> Result<()> {
    let _: Value = client.post(&format!("admin/withdrawals/{id}/reject"), &note_body(note)).await?;
    tracing::info!("Withdrawal {} rejected and refunded", id);
    Ok(())
}

pub async fn complete_withdrawal(client: &ApiClient, id: Uuid, tx_hash: String) -> Result<()> {
    let _: Value = client
        .post(&format!("admin/withdrawals/{id}/complete"), &json!({ "tx_hash": tx_hash }))
        .await?;
    tracing::info!("✅ Withdrawal {} marked completed", id);
    Ok(())
}

pub async fn kyc(client: &ApiClient, status: Option<String>, page: i64, limit: i64) -> Result<()> {
    let list: Page<Value> = client.get("admin/kyc", &page_query(&status, page, limit)).await?;
    for k in &list.items {
        println!(
            "{}  {:<8}  user {}  {:<15}  {}  {}",
            field(k, "id"),
            field(k, "status"),
            field(k, "user_id"),
            field(k, "document_type"),
            field(k, "document_number"),
            field(k, "document_url"),
        );
    }
    print_footer(&list);
    Ok(())
}

pub async fn approve_kyc(client: &ApiClient, id: Uuid) -> Result<()> {
    let _: Value = client.post(&format!("admin/kyc/{id}/approve"), &json!({})).await?;
    tracing::info!("✅ KYC submission {} approved", id);
    Ok(())
}

pub async fn reject_kyc(client: &ApiClient, id: Uuid, note: Option<String>) -> Result<()> {
    let _: Value = client.post(&format!("admin/kyc/{id}/reject"), &note_body(note)).await?;
    tracing::info!("KYC submission {} rejected", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_includes_status_only_when_set() {
        assert_eq!(
            page_query(&None, 2, 50),
            vec![("page", "2".to_string()), ("limit", "50".to_string())]
        );
        let query = page_query(&Some("pending".to_string()), 1, 20);
        assert_eq!(query.last(), Some(&("status", "pending".to_string())));
        assert_eq!(page_query(&Some(ALL_STATUSES.to_string()), 1, 20).len(), 2);
        assert_eq!(page_query(&Some("ALL".to_string()), 1, 20).len(), 2);
    }

    #[test]
    fn test_field_helpers() {
        let item = json!({ "status": "approved", "amount_cents": 150000 });
        assert_eq!(field(&item, "status"), "approved");
        assert_eq!(field(&item, "missing"), "-");
        assert_eq!(cents(&item, "amount_cents"), format_usd(150000));
        assert_eq!(cents(&item, "missing"), "-");
    }

    #[test]
    fn test_note_body() {
        assert_eq!(note_body(None), json!({}));
        assert_eq!(note_body(Some("bad hash".into())), json!({ "note": "bad hash" }));
    }
}
