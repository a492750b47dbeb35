//! Esquema Diesel. Debe coincidir con `migrations/`.

diesel::table! {
    workflows (id) {
        id -> BigInt,
        name -> Text,
        description -> Text,
        active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_steps (id) {
        id -> BigInt,
        workflow_id -> BigInt,
        step_order -> Integer,
        step_name -> Text,
        email_subject -> Text,
        email_body -> Text,
        email_body_text -> Nullable<Text>,
        delay_type -> Text,
        delay_value -> Nullable<Text>,
        scheduled_date -> Nullable<Timestamptz>,
        contract_template_id -> Nullable<BigInt>,
        form_template_id -> Nullable<BigInt>,
        include_appointment_link -> Bool,
        appointment_type_id -> Nullable<BigInt>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_enrollments (id) {
        id -> BigInt,
        workflow_id -> BigInt,
        client_id -> BigInt,
        status -> Text,
        enrolled_at -> Timestamptz,
        enrolled_by -> BigInt,
        completed_at -> Nullable<Timestamptz>,
        cancelled_at -> Nullable<Timestamptz>,
        cancelled_by -> Nullable<BigInt>,
    }
}

diesel::table! {
    workflow_step_executions (id) {
        id -> BigInt,
        enrollment_id -> BigInt,
        step_id -> BigInt,
        step_order -> Integer,
        status -> Text,
        scheduled_for -> Timestamptz,
        claimed_at -> Nullable<Timestamptz>,
        claimed_by -> Nullable<Text>,
        executed_at -> Nullable<Timestamptz>,
        error_message -> Nullable<Text>,
    }
}

diesel::table! {
    client_credits (client_id) {
        client_id -> BigInt,
        credit_balance -> BigInt,
        total_purchased -> BigInt,
        total_consumed -> BigInt,
        total_adjusted -> BigInt,
        total_expired -> BigInt,
        credits_expire -> Bool,
        expiration_days -> Nullable<Integer>,
        last_purchase_at -> Nullable<Timestamptz>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    credit_transactions (id) {
        id -> BigInt,
        client_id -> BigInt,
        transaction_type -> Text,
        amount -> BigInt,
        balance_before -> BigInt,
        balance_after -> BigInt,
        booking_id -> Nullable<BigInt>,
        notes -> Nullable<Text>,
        created_by -> Nullable<BigInt>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    clients (id) {
        id -> BigInt,
        name -> Text,
        email -> Nullable<Text>,
    }
}

diesel::table! {
    email_outbox (id) {
        id -> BigInt,
        to_address -> Text,
        subject -> Text,
        html_body -> Text,
        text_body -> Nullable<Text>,
        created_at -> Timestamptz,
        sent_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(workflow_steps -> workflows (workflow_id));
diesel::joinable!(workflow_enrollments -> workflows (workflow_id));
diesel::joinable!(workflow_step_executions -> workflow_enrollments (enrollment_id));
diesel::joinable!(credit_transactions -> client_credits (client_id));

diesel::allow_tables_to_appear_in_same_query!(
    workflows,
    workflow_steps,
    workflow_enrollments,
    workflow_step_executions,
    client_credits,
    credit_transactions,
    clients,
    email_outbox,
);
