diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        fullname -> Varchar,
        avatar -> Varchar,
        cover_image -> Nullable<Varchar>,
        password_hash -> Varchar,
        refresh_token -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    videos (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Text,
        duration -> Float8,
        video_file -> Varchar,
        thumbnail -> Varchar,
        publisher_id -> Uuid,
        is_published -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    subscriptions (id) {
        id -> Uuid,
        subscriber_id -> Uuid,
        channel_id -> Uuid,
        created_at -> Timestamp,
    }
}

diesel::table! {
    views (id) {
        id -> Uuid,
        video_id -> Uuid,
        owner_id -> Uuid,
        viewer_id -> Uuid,
        created_at -> Timestamp,
    }
}

diesel::joinable!(videos -> users (publisher_id));
diesel::joinable!(views -> videos (video_id));

diesel::allow_tables_to_appear_in_same_query!(subscriptions, users, videos, views,);
