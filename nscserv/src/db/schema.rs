// Diesel schema definition for the NSC database
use diesel::allow_tables_to_appear_in_same_query;
use diesel::joinable;
use diesel::table;

table! {
    users (id) {
        id -> Uuid,
        email -> Text,
        password_hash -> Text,
        full_name -> Text,
        referral_code -> Text,
        referrer_id -> Nullable<Uuid>,
        role -> Text,
        status -> Text,
        kyc_status -> Text,
        balance_cents -> BigInt,
        bot_active -> Bool,
        bot_activated_at -> Nullable<Timestamptz>,
        last_withdrawal_at -> Nullable<Timestamptz>,
        password_reset_hash -> Nullable<Text>,
        password_reset_expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    kyc_submissions (id) {
        id -> Uuid,
        user_id -> Uuid,
        full_name -> Text,
        document_type -> Text,
        document_number -> Text,
        country -> Text,
        document_url -> Text,
        status -> Text,
        review_note -> Nullable<Text>,
        reviewed_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        reviewed_at -> Nullable<Timestamptz>,
    }
}

table! {
    payment_requests (id) {
        id -> Uuid,
        user_id -> Uuid,
        purpose -> Text,
        amount_cents -> BigInt,
        network -> Text,
        tx_hash -> Text,
        plan_code -> Nullable<Text>,
        status -> Text,
        review_note -> Nullable<Text>,
        reviewed_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        reviewed_at -> Nullable<Timestamptz>,
    }
}

table! {
    bot_activations (id) {
        id -> Uuid,
        user_id -> Uuid,
        payment_request_id -> Uuid,
        fee_cents -> BigInt,
        activated_at -> Timestamptz,
    }
}

table! {
    packages (id) {
        id -> Uuid,
        user_id -> Uuid,
        payment_request_id -> Uuid,
        plan_code -> Text,
        amount_cents -> BigInt,
        monthly_roi_bps -> Integer,
        roi_paid_count -> Integer,
        max_roi_payments -> Integer,
        status -> Text,
        activated_at -> Timestamptz,
        next_roi_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

table! {
    roi_payments (id) {
        id -> Uuid,
        package_id -> Uuid,
        user_id -> Uuid,
        payment_number -> Integer,
        amount_cents -> BigInt,
        paid_at -> Timestamptz,
    }
}

table! {
    earnings (id) {
        id -> Uuid,
        user_id -> Uuid,
        source_user_id -> Nullable<Uuid>,
        package_id -> Nullable<Uuid>,
        earning_type -> Text,
        level -> Nullable<Integer>,
        amount_cents -> BigInt,
        created_at -> Timestamptz,
    }
}

table! {
    transactions (id) {
        id -> Uuid,
        user_id -> Uuid,
        tx_type -> Text,
        amount_cents -> BigInt,
        balance_after_cents -> BigInt,
        reference_id -> Nullable<Uuid>,
        description -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    withdrawals (id) {
        id -> Uuid,
        user_id -> Uuid,
        amount_cents -> BigInt,
        fee_cents -> BigInt,
        net_amount_cents -> BigInt,
        network -> Text,
        wallet_address -> Text,
        status -> Text,
        tx_hash -> Nullable<Text>,
        review_note -> Nullable<Text>,
        reviewed_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        reviewed_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
    }
}

table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        kind -> Text,
        title -> Text,
        message -> Text,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    sessions (id) {
        id -> Uuid,
        user_id -> Uuid,
        user_agent -> Nullable<Text>,
        ip_address -> Nullable<Text>,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
        revoked_at -> Nullable<Timestamptz>,
    }
}

table! {
    audit_logs (id) {
        id -> Uuid,
        actor_id -> Nullable<Uuid>,
        event_type -> Text,
        event_data -> Text,
        ip_address -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

joinable!(kyc_submissions -> users (user_id));
joinable!(payment_requests -> users (user_id));
joinable!(packages -> users (user_id));
joinable!(withdrawals -> users (user_id));

allow_tables_to_appear_in_same_query!(
    users,
    kyc_submissions,
    payment_requests,
    bot_activations,
    packages,
    roi_payments,
    earnings,
    transactions,
    withdrawals,
    notifications,
    sessions,
    audit_logs,
);
