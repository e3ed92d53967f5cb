//! bcrypt password hashing, run off the async executor.

use thiserror::Error;

pub use bcrypt::DEFAULT_COST;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a password with the given bcrypt cost.
pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Check a password against a stored hash. A malformed hash never matches.
pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("user123".to_string(), TEST_COST)
            .await
            .unwrap();

        assert_ne!(hash, "user123");
        assert_eq!(hash.len(), 60);
        assert!(verify_password("user123".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_plaintext_hash_never_matches() {
        let result = verify_password("user123".to_string(), "user123".to_string()).await;
        assert!(!result.unwrap());
    }
}
