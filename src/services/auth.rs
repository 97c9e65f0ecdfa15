use crate::database::DbPool;
use crate::models::user::{User, UserResponse};
use crate::services::users::{find_by_username, insert_user};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::JwtService;
use crate::utils::validation::{validate_full_name, validate_password, validate_username};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

pub async fn register_user(
    pool: &DbPool,
    request: RegisterRequest,
    jwt_service: &JwtService,
) -> AppResult<AuthResponse> {
    validate_username(&request.username)?;
    validate_full_name(&request.full_name)?;
    validate_password(&request.password)?;

    if find_by_username(pool, &request.username).await?.is_some() {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    let user = User::new(
        request.username,
        request.full_name.trim().to_string(),
        password_hash,
    );

    insert_user(pool, &user).await?;
    tracing::info!(user_id = %user.id, "registered user {}", user.username);

    let token = jwt_service.generate_token(&user.id, &user.username)?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn login_user(
    pool: &DbPool,
    request: LoginRequest,
    jwt_service: &JwtService,
) -> AppResult<AuthResponse> {
    let user = find_by_username(pool, &request.username)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid username or password".to_string()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        tracing::debug!("failed login for {}", user.username);
        return Err(AppError::Auth("Invalid username or password".to_string()));
    }

    let token = jwt_service.generate_token(&user.id, &user.username)?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestEnv;

    fn request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            full_name: "Dana Doe".to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let env = TestEnv::new().await;
        let jwt = JwtService::new("test-secret");

        let registered = register_user(&env.pool, request("dana"), &jwt).await.unwrap();
        assert_eq!(jwt.extract_user_id(&registered.token).unwrap(), registered.user.id);

        let logged_in = login_user(
            &env.pool,
            LoginRequest {
                username: "dana".to_string(),
                password: "hunter22".to_string(),
            },
            &jwt,
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let env = TestEnv::new().await;
        let jwt = JwtService::new("test-secret");

        register_user(&env.pool, request("dana"), &jwt).await.unwrap();
        let again = register_user(&env.pool, request("DANA"), &jwt).await;
        assert!(matches!(again, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let env = TestEnv::new().await;
        let jwt = JwtService::new("test-secret");
        register_user(&env.pool, request("dana"), &jwt).await.unwrap();

        let result = login_user(
            &env.pool,
            LoginRequest {
                username: "dana".to_string(),
                password: "nope".to_string(),
            },
            &jwt,
        )
        .await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
