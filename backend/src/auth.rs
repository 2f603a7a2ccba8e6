use log::info;

use crate::error::{AuthError, StoreError};
use crate::store::CredentialStore;

/// Checks a username/password pair against the stored bcrypt hash.
///
/// Unknown users and wrong passwords are indistinguishable to the caller.
pub fn verify_credentials(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    let hash = store
        .password_hash_for(username)?
        .ok_or(AuthError::InvalidCredentials)?;

    if bcrypt::verify(password, &hash).map_err(StoreError::from)? {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Creates the initial admin account when the users table is empty.
/// Returns whether a user was inserted.
pub fn ensure_admin_user(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
    cost: u32,
) -> Result<bool, StoreError> {
    if store.user_count()? > 0 {
        return Ok(false);
    }

    info!("No users found, creating initial admin user '{}'", username);
    let hash = bcrypt::hash(password, cost)?;
    store.insert_user(username, &hash)?;
    Ok(true)
}
