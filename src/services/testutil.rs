use crate::db::Database;

pub(crate) async fn test_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    db
}

pub(crate) async fn insert_user(db: &Database, id: &str, points: i64) {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, username, password_hash, points)
        VALUES (?, ?, ?, 'x', ?)
        "#,
    )
    .bind(id)
    .bind(format!("{}@example.com", id))
    .bind(id)
    .bind(points)
    .execute(db.pool())
    .await
    .unwrap();
}

pub(crate) async fn insert_file(db: &Database, id: &str, author_id: &str, price: i64) {
    sqlx::query(
        r#"
        INSERT INTO files (id, author_id, title, file_type, price,
                           file_key, thumbnail_key, preview_key)
        VALUES (?, ?, ?, 'image/png', ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(format!("file {}", id))
    .bind(price)
    .bind(format!("{}-orig", id))
    .bind(format!("{}-thumb", id))
    .bind(format!("{}-preview", id))
    .execute(db.pool())
    .await
    .unwrap();
}
