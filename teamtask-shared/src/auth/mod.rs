/// Authentication and authorization core
///
/// # Modules
///
/// - [`jwt`]: Token issuer for access and refresh tokens
/// - [`password`]: Argon2id password hashing and verification
/// - [`refresh`]: One-way hashing of raw refresh tokens
/// - [`policy`]: Login session policy (one active session by default)
/// - [`session`]: Register, login, rotate, and logout workflows
/// - [`middleware`]: Bearer token guard and request identity
/// - [`authorization`]: Team and task permission checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 with separate access and refresh secrets
/// - **Refresh Tokens**: Stored only as SHA-256 digests, single-use rotation
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::jwt::{JwtConfig, TokenIssuer};
/// use teamtask_shared::auth::middleware::authenticate;
/// use teamtask_shared::models::user::UserType;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new(JwtConfig::new(
///     "access-secret-at-least-32-bytes-long!!",
///     "refresh-secret-at-least-32-bytes-long!",
/// ))?;
///
/// let signed = issuer.mint_access(Uuid::new_v4(), "user@example.com", UserType::Admin)?;
/// let header = format!("Bearer {}", signed.token);
/// let identity = authenticate(&issuer, Some(&header))?;
/// assert_eq!(identity.user_type, UserType::Admin);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod refresh;
pub mod session;
