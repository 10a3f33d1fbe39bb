// Kept in sync with schema.sql by hand.

diesel::table! {
    profiles (user_id) {
        #[max_length = 255]
        user_id -> Varchar,
        #[max_length = 255]
        display_name -> Varchar,
        #[max_length = 255]
        main_email -> Varchar,
        #[max_length = 16]
        tee_shirt_size -> Varchar,
        conference_keys_to_attend -> Array<Int8>,
        session_wishlist_keys -> Array<Int8>,
    }
}

diesel::table! {
    conferences (id) {
        id -> Int8,
        #[max_length = 255]
        organizer_user_id -> Varchar,
        #[max_length = 255]
        name -> Varchar,
        description -> Nullable<Text>,
        topics -> Array<Text>,
        #[max_length = 255]
        city -> Varchar,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        month -> Int4,
        max_attendees -> Int4,
        seats_available -> Int4,
    }
}

diesel::table! {
    sessions (id) {
        id -> Int8,
        conference_id -> Int8,
        #[max_length = 255]
        name -> Varchar,
        highlights -> Array<Text>,
        #[max_length = 255]
        speaker -> Varchar,
        duration -> Nullable<Time>,
        #[max_length = 255]
        type_of_session -> Nullable<Varchar>,
        session_date -> Nullable<Date>,
        start_time -> Nullable<Time>,
    }
}

diesel::joinable!(conferences -> profiles (organizer_user_id));
diesel::joinable!(sessions -> conferences (conference_id));

diesel::allow_tables_to_appear_in_same_query!(conferences, profiles, sessions,);
