diesel::table! {
    applications (id) {
        id -> Uuid,
        data -> Jsonb,
        #[max_length = 32]
        status -> Varchar,
        supplier_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    audit_events (id) {
        id -> Uuid,
        #[max_length = 64]
        audit_type -> Varchar,
        #[max_length = 255]
        actor -> Varchar,
        data -> Jsonb,
        #[max_length = 64]
        object_type -> Nullable<Varchar>,
        object_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    brief_clarification_questions (id) {
        id -> Uuid,
        brief_id -> Uuid,
        question -> Text,
        answer -> Text,
        published_at -> Timestamptz,
    }
}

diesel::table! {
    brief_responses (id) {
        id -> Uuid,
        brief_id -> Uuid,
        supplier_id -> Uuid,
        data -> Jsonb,
        submitted_at -> Nullable<Timestamptz>,
        withdrawn_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    brief_users (brief_id, user_id) {
        brief_id -> Uuid,
        user_id -> Uuid,
    }
}

diesel::table! {
    briefs (id) {
        id -> Uuid,
        framework_id -> Uuid,
        lot_id -> Uuid,
        data -> Jsonb,
        published_at -> Nullable<Timestamptz>,
        withdrawn_at -> Nullable<Timestamptz>,
        closed_notified_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    frameworks (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 255]
        slug -> Varchar,
        #[max_length = 16]
        status -> Varchar,
    }
}

diesel::table! {
    lots (id) {
        id -> Uuid,
        framework_id -> Uuid,
        #[max_length = 255]
        slug -> Varchar,
        #[max_length = 255]
        name -> Varchar,
        allows_brief -> Bool,
    }
}

diesel::table! {
    suppliers (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 16]
        status -> Varchar,
        data -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        #[max_length = 255]
        email_address -> Varchar,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 16]
        role -> Varchar,
        supplier_id -> Nullable<Uuid>,
        application_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    work_orders (id) {
        id -> Uuid,
        brief_id -> Uuid,
        supplier_id -> Uuid,
        data -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(brief_clarification_questions -> briefs (brief_id));
diesel::joinable!(brief_responses -> briefs (brief_id));
diesel::joinable!(brief_responses -> suppliers (supplier_id));
diesel::joinable!(brief_users -> briefs (brief_id));
diesel::joinable!(brief_users -> users (user_id));
diesel::joinable!(briefs -> frameworks (framework_id));
diesel::joinable!(briefs -> lots (lot_id));
diesel::joinable!(lots -> frameworks (framework_id));
diesel::joinable!(users -> applications (application_id));
diesel::joinable!(users -> suppliers (supplier_id));
diesel::joinable!(work_orders -> briefs (brief_id));
diesel::joinable!(work_orders -> suppliers (supplier_id));

diesel::allow_tables_to_appear_in_same_query!(
    applications,
    audit_events,
    brief_clarification_questions,
    brief_responses,
    brief_users,
    briefs,
    frameworks,
    lots,
    suppliers,
    users,
    work_orders,
);
