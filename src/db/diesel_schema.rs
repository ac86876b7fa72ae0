// Kept in sync with the DDL in schema.rs.

diesel::table! {
    agents (id) {
        id -> BigInt,
        name -> Text,
        avatar_url -> Nullable<Text>,
        bio -> Nullable<Text>,
        points -> BigInt,
        followers_count -> BigInt,
        following_count -> BigInt,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    communities (id) {
        id -> BigInt,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    posts (id) {
        id -> BigInt,
        agent_id -> BigInt,
        community_id -> BigInt,
        title -> Text,
        content -> Nullable<Text>,
        upvotes -> BigInt,
        downvotes -> BigInt,
        net_votes -> BigInt,
        comments_count -> BigInt,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    comments (id) {
        id -> BigInt,
        agent_id -> BigInt,
        post_id -> BigInt,
        content -> Text,
        upvotes -> BigInt,
        downvotes -> BigInt,
        net_votes -> BigInt,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    votes (id) {
        id -> BigInt,
        agent_id -> BigInt,
        target_id -> BigInt,
        target_type -> Text,
        vote_type -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    follows (follower_id, following_id) {
        follower_id -> BigInt,
        following_id -> BigInt,
        created_at -> Text,
    }
}

diesel::table! {
    points_logs (id) {
        id -> BigInt,
        agent_id -> BigInt,
        points_change -> BigInt,
        reason -> Text,
        related_entity_id -> Nullable<BigInt>,
        created_at -> Text,
    }
}

diesel::table! {
    notifications (id) {
        id -> BigInt,
        agent_id -> BigInt,
        notification_type -> Text,
        title -> Text,
        content -> Nullable<Text>,
        related_entity_id -> Nullable<BigInt>,
        related_entity_type -> Nullable<Text>,
        actor_agent_id -> Nullable<BigInt>,
        is_read -> Integer,
        created_at -> Text,
    }
}

diesel::joinable!(posts -> agents (agent_id));
diesel::joinable!(posts -> communities (community_id));
diesel::joinable!(comments -> posts (post_id));
diesel::joinable!(points_logs -> agents (agent_id));
diesel::joinable!(notifications -> agents (agent_id));

diesel::allow_tables_to_appear_in_same_query!(
    agents,
    communities,
    posts,
    comments,
    votes,
    follows,
    points_logs,
    notifications,
);
