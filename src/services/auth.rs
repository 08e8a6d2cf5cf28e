use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Claims, CreateUserRequest, CurrentUser, LoginRequest, LoginResponse, User, UserResponse,
    UserRole,
};

/// Registration, login and token validation
pub struct AuthService;

impl AuthService {
    pub async fn register(db: &Database, req: CreateUserRequest) -> Result<UserResponse> {
        if req.email.trim().is_empty() || !req.email.contains('@') {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }
        if req.password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&req.email)
            .fetch_optional(db.pool())
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = Self::hash_password(&req.password)?;
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, role, points, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'user', 0, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&req.email)
        .bind(&req.username)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(db.pool())
            .await?;

        tracing::info!("Registered new user {}", user_id);
        Ok(user.into())
    }

    pub async fn login(db: &Database, jwt: &JwtConfig, req: LoginRequest) -> Result<LoginResponse> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&req.email)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid email or password".to_string()));
        }

        let access_token = Self::issue_token(jwt, &user)?;
        Ok(LoginResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: jwt.access_token_expire_minutes * 60,
            user: user.into(),
        })
    }

    /// Decode a bearer token into the caller identity
    pub fn validate_token(jwt: &JwtConfig, token: &str) -> Result<CurrentUser> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(CurrentUser {
            id: data.claims.sub,
            role: UserRole::from_str(&data.claims.role),
        })
    }

    fn issue_token(jwt: &JwtConfig, user: &User) -> Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role.clone(),
            exp: now + (jwt.access_token_expire_minutes * 60) as usize,
            iat: now,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt.secret.as_bytes()),
        )?)
    }

    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Corrupt password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_db;

    fn register_req(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            username: "tester".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let db = test_db().await;
        let jwt = JwtConfig::default();

        let user = AuthService::register(&db, register_req("a@example.com")).await.unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.role, "user");

        let login = AuthService::login(
            &db,
            &jwt,
            LoginRequest {
                email: "a@example.com".to_string(),
                password: "correct horse".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(login.token_type, "bearer");

        let current = AuthService::validate_token(&jwt, &login.access_token).unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.role, UserRole::User);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let db = test_db().await;
        AuthService::register(&db, register_req("a@example.com")).await.unwrap();
        let err = AuthService::register(&db, register_req("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let db = test_db().await;
        let jwt = JwtConfig::default();
        AuthService::register(&db, register_req("a@example.com")).await.unwrap();

        let err = AuthService::login(
            &db,
            &jwt,
            LoginRequest {
                email: "a@example.com".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let db = test_db().await;
        let mut req = register_req("a@example.com");
        req.password = "short".to_string();
        let err = AuthService::register(&db, req).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let jwt = JwtConfig::default();
        let err = AuthService::validate_token(&jwt, "not-a-token").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
