diesel::table! {
    appointments (id) {
        id -> Int4,
        user_id -> Int4,
        pet_id -> Nullable<Int4>,
        pet_name -> Nullable<Varchar>,
        owner_name -> Varchar,
        reason_for_visit -> Text,
        appointment_date -> Date,
        appointment_time -> Time,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int4,
        user_id -> Int4,
        #[sql_name = "type"]
        type_ -> Varchar,
        notifiable_type -> Varchar,
        notifiable_id -> Int4,
        data -> Jsonb,
        read_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    conversations (id) {
        id -> Int4,
        pet_owner_id -> Int4,
        admin_id -> Int4,
        unique_key -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        name -> Varchar,
        role -> Varchar,
        last_activity -> Nullable<Timestamptz>,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    appointments,
    notifications,
    conversations,
    users,
);
