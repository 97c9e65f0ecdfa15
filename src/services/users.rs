use crate::database::DbPool;
use crate::models::user::User;
use crate::utils::error::AppResult;

pub async fn insert_user(pool: &DbPool, user: &User) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO users (id, username, full_name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .execute(pool.as_ref())
    .await?;

    Ok(())
}

pub async fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER(?)")
        .bind(username)
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, user_id: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(user)
}
