diesel::table! {
    bookings (id) {
        id -> Uuid,
        restaurant_id -> Uuid,
        user_id -> Uuid,
        booking_date -> Date,
        booking_time -> Time,
        num_guests -> Int4,
        table_id -> Varchar,
        customer_name -> Varchar,
        customer_phone -> Varchar,
        customer_email -> Varchar,
        special_requests -> Nullable<Text>,
        dietary_restrictions -> Nullable<Text>,
        deposit_amount -> Numeric,
        payment_status -> Varchar,
        payment_reference_id -> Nullable<Varchar>,
        booking_status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        cancelled_at -> Nullable<Timestamptz>,
        checked_in_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    payment_attempts (booking_id) {
        booking_id -> Uuid,
        started_at -> Timestamptz,
    }
}

diesel::table! {
    restaurant_tables (restaurant_id, table_id) {
        restaurant_id -> Uuid,
        table_id -> Varchar,
        capacity -> Int4,
        table_type -> Varchar,
        position -> Int4,
    }
}

diesel::table! {
    restaurants (id) {
        id -> Uuid,
        name -> Varchar,
        deposit_per_person -> Numeric,
        admin_email -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(payment_attempts -> bookings (booking_id));
diesel::joinable!(restaurant_tables -> restaurants (restaurant_id));

diesel::allow_tables_to_appear_in_same_query!(
    bookings,
    payment_attempts,
    restaurant_tables,
    restaurants,
);
