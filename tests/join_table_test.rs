//! Integration tests for join tables between registered entity types.

mod common;

use common::MockPool;
use relmap::dialect::SqlDialect;
use relmap::error::DbError;
use relmap::models::{EntityType, ModelCatalog, PrimaryKeyColumn, Record, Value};
use relmap::relationships::JoinTableOptions;
use std::sync::Arc;

const CREATE_COMMENTS_POSTS: &str = "CREATE TABLE `comments_posts` (`post_id` integer NOT NULL, `comment_id` integer NOT NULL, PRIMARY KEY (`post_id`, `comment_id`))";

async fn blog(pool: &MockPool) -> Arc<ModelCatalog<MockPool>> {
    let catalog = Arc::new(ModelCatalog::new(pool.adapter()));
    catalog.define("Post").await;
    catalog.define("Comment").await;
    catalog
}

// =========================================================================
// Naming
// =========================================================================

#[tokio::test]
async fn test_name_and_keys() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;

    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert_eq!(join.name(), "comments_posts");
    assert_eq!(join.keys(), vec!["post_id", "comment_id"]);

    // reversed participants share the table but not the key order
    let reversed = catalog
        .join_table("comments", "Post", JoinTableOptions::default())
        .await
        .unwrap();
    assert_eq!(reversed.name(), "comments_posts");
    assert_eq!(reversed.keys(), vec!["comment_id", "post_id"]);
}

#[tokio::test]
async fn test_keys_follow_primary_key_columns() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    catalog
        .register(
            EntityType::new("Tag", "tags").with_primary_key(vec![PrimaryKeyColumn::new(
                "slug",
                "varchar(64)",
            )]),
        )
        .await;

    let join = catalog
        .join_table("post", "tag", JoinTableOptions::default())
        .await
        .unwrap();

    assert_eq!(join.name(), "posts_tags");
    assert_eq!(join.keys(), vec!["post_id", "tag_slug"]);
    assert_eq!(
        pool.adapter().dialect().create_table_sql(&join.schema()),
        "CREATE TABLE `posts_tags` (`post_id` integer NOT NULL, `tag_slug` varchar(64) NOT NULL, PRIMARY KEY (`post_id`, `tag_slug`))"
    );
}

#[tokio::test]
async fn test_unknown_participant_is_a_schema_error() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;

    let err = catalog
        .join_table("post", "label", JoinTableOptions::default())
        .await
        .unwrap_err();

    match err {
        DbError::Schema { object, .. } => assert_eq!(object, "label"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_participants_given_as_types() {
    let pool = MockPool::new();
    let catalog = Arc::new(ModelCatalog::new(pool.adapter()));
    let post = catalog.define("Post").await;
    let person = Arc::new(EntityType::new("Person", "person"));

    let join = catalog
        .join_table(&post, person, JoinTableOptions::default())
        .await
        .unwrap();

    assert_eq!(join.name(), "people_posts");
    assert_eq!(join.keys(), vec!["post_id", "person_id"]);
}

// =========================================================================
// Associative type
// =========================================================================

#[tokio::test]
async fn test_join_class_registered_once() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    let first = join.join_class().await;
    let second = join.join_class().await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name, "PostComment");
    assert_eq!(first.table_name, "comments_posts");
    assert_eq!(first.primary_key_names(), vec!["post_id", "comment_id"]);

    let registered = catalog.lookup("PostComment").await.unwrap();
    assert!(Arc::ptr_eq(&first, &registered));
    assert_eq!(catalog.len().await, 3);
}

#[tokio::test]
async fn test_join_class_shared_between_join_tables() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let a = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();
    let b = catalog
        .join_table("posts", "comments", JoinTableOptions::default())
        .await
        .unwrap();

    let (x, y) = tokio::join!(a.join_class(), b.join_class());
    assert!(Arc::ptr_eq(&x, &y));
    assert_eq!(catalog.len().await, 3);
}

#[tokio::test]
async fn test_existing_type_reused_as_join_class() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let existing = catalog
        .register(EntityType::new("PostComment", "post_comment_links"))
        .await;

    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();
    let join_class = join.join_class().await;

    assert!(Arc::ptr_eq(&existing, &join_class));
    assert_eq!(join_class.primary_key_names(), vec!["id"]);
}

#[tokio::test]
async fn test_create_inserts_join_row() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    let row = join
        .create(Record::new().with("post_id", 1).with("comment_id", 2))
        .await
        .unwrap();

    assert!(row.is_persisted());
    assert_eq!(row.entity().name, "PostComment");
    assert_eq!(row.get("post_id"), Some(&Value::Integer(1)));
    assert_eq!(row.get("comment_id"), Some(&Value::Integer(2)));
    // composite keys are never filled from the generated id
    assert_eq!(row.values().len(), 2);
    assert_eq!(
        pool.statements(),
        vec!["INSERT INTO `comments_posts` (`post_id`, `comment_id`) VALUES (1, 2)"]
    );
}

#[tokio::test]
async fn test_create_failure_propagates() {
    let pool = MockPool::new();
    pool.fail_on("INSERT INTO `comments_posts`");
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    let err = join
        .create(Record::new().with("post_id", 1).with("comment_id", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));
}

// =========================================================================
// Table management
// =========================================================================

#[tokio::test]
async fn test_create_table_when_absent() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert!(!join.exists().await.unwrap());
    pool.clear_statements();

    assert!(join.create_table().await.unwrap());
    assert_eq!(pool.statements(), vec!["SHOW TABLES", CREATE_COMMENTS_POSTS]);
    assert!(join.exists().await.unwrap());
}

#[tokio::test]
async fn test_create_table_with_storage_options() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let options = JoinTableOptions::default()
        .with_engine("InnoDB")
        .with_charset("utf8mb4");
    let join = catalog.join_table("post", "comment", options).await.unwrap();

    assert!(join.create_table().await.unwrap());
    assert_eq!(
        pool.statements()[1],
        format!("{CREATE_COMMENTS_POSTS} ENGINE=InnoDB DEFAULT CHARSET=utf8mb4")
    );
}

#[tokio::test]
async fn test_create_table_when_present_does_nothing() {
    let pool = MockPool::new();
    pool.add_table("comments_posts");
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert!(!join.create_table().await.unwrap());
    assert_eq!(pool.statements(), vec!["SHOW TABLES"]);
}

#[tokio::test]
async fn test_recreate_table_drops_existing() {
    let pool = MockPool::new();
    pool.add_table("comments_posts");
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert!(join.recreate_table().await.unwrap());
    assert_eq!(
        pool.statements(),
        vec![
            "SHOW TABLES",
            "DROP TABLE `comments_posts`",
            CREATE_COMMENTS_POSTS
        ]
    );
    assert_eq!(pool.tables(), vec!["comments_posts"]);
}

#[tokio::test]
async fn test_recreate_table_when_absent_only_creates() {
    let pool = MockPool::new();
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert!(join.recreate_table().await.unwrap());
    assert_eq!(pool.statements(), vec!["SHOW TABLES", CREATE_COMMENTS_POSTS]);
}

#[tokio::test]
async fn test_create_table_error_propagates() {
    let pool = MockPool::new();
    pool.fail_on("CREATE TABLE");
    let catalog = blog(&pool).await;
    let join = catalog
        .join_table("post", "comment", JoinTableOptions::default())
        .await
        .unwrap();

    assert!(join.create_table().await.is_err());
    assert!(pool.tables().is_empty());
}

// =========================================================================
// Entity instances
// =========================================================================

#[tokio::test]
async fn test_save_fills_generated_id() {
    let pool = MockPool::new();
    let adapter = pool.adapter();
    let catalog = blog(&pool).await;
    let post = catalog.lookup("Post").await.unwrap();

    let saved = post
        .instance(Record::new().with("title", "hello"))
        .save(&adapter)
        .await
        .unwrap();

    assert_eq!(saved.get("id"), Some(&Value::Integer(1)));
    assert_eq!(
        pool.statements(),
        vec!["INSERT INTO `posts` (`title`) VALUES ('hello')"]
    );

    let err = saved.save(&adapter).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}
