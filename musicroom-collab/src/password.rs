use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;

use crate::RoomError;

/// Hashes room passwords with argon2
#[derive(Default)]
pub struct RoomPasswords {
    argon: Argon2<'static>,
}

impl RoomPasswords {
    pub fn hash(&self, password: &str) -> Result<String, RoomError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| RoomError::HashError(e.to_string()))
    }

    /// Fails with [RoomError::InvalidRoomPassword] if the password does not match
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), RoomError> {
        let stored = PasswordHash::parse(hash, Encoding::default())
            .map_err(|e| RoomError::HashError(e.to_string()))?;

        self.argon
            .verify_password(password.as_bytes(), &stored)
            .map_err(|_| RoomError::InvalidRoomPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_hashed_password() {
        let passwords = RoomPasswords::default();
        let hash = passwords.hash("hunter2").unwrap();

        assert_ne!(hash, "hunter2");
        assert!(passwords.verify("hunter2", &hash).is_ok());
        assert!(matches!(
            passwords.verify("hunter3", &hash),
            Err(RoomError::InvalidRoomPassword)
        ));
    }

    #[test]
    fn garbage_hashes_are_hash_errors() {
        let passwords = RoomPasswords::default();

        assert!(matches!(
            passwords.verify("hunter2", "not a hash"),
            Err(RoomError::HashError(_))
        ));
    }
}
