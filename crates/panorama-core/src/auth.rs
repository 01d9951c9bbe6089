use panorama_db::models::UserRow;
use rand::Rng;
use sha2::{Digest, Sha512};

pub const SALT_LEN: usize = 20;
const SALT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hex SHA-512 of `password ++ salt`.
pub fn hash(password: &str, salt: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// 20 characters drawn uniformly from `A-Z0-9`. Stored in clear next to the hash.
pub fn generate_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LEN)
        .map(|_| SALT_ALPHABET[rng.random_range(0..SALT_ALPHABET.len())] as char)
        .collect()
}

pub fn is_alphanumeric(password: &str) -> bool {
    !password.is_empty() && password.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Never fails loudly: an absent user, a password with anything but ASCII
/// letters and digits, or a digest mismatch all just mean "no".
pub fn authenticate(user: Option<&UserRow>, supplied: &str) -> bool {
    let Some(user) = user else {
        return false;
    };
    if !is_alphanumeric(supplied) {
        return false;
    }
    hash(supplied, &user.salt) == user.hashed_password
}

#[cfg(test)]
mod tests {
    use super::*;
    use panorama_types::models::Role;

    fn user_with(password: &str, salt: &str) -> UserRow {
        UserRow {
            id: 1,
            name: "mio".into(),
            role: Role::Visitor,
            hashed_password: hash(password, salt),
            salt: salt.into(),
        }
    }

    #[test]
    fn hash_is_deterministic_and_salt_sensitive() {
        assert_eq!(hash("abc", "SALT"), hash("abc", "SALT"));
        assert_ne!(hash("abc", "SALT"), hash("abc", "SALU"));
        assert_eq!(hash("abc", "SALT").len(), 128);
        // Concatenation, not a keyed construction.
        assert_eq!(hash("ab", "cSALT"), hash("abc", "SALT"));
    }

    #[test]
    fn salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(salt.bytes().all(|b| SALT_ALPHABET.contains(&b)));
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn accepts_the_right_password() {
        let user = user_with("hunter22", "ABCDEFGHIJ0123456789");
        assert!(authenticate(Some(&user), "hunter22"));
    }

    #[test]
    fn rejects_absent_user() {
        assert!(!authenticate(None, "hunter22"));
    }

    #[test]
    fn rejects_correct_password_with_wrong_salt() {
        let mut user = user_with("hunter22", "ABCDEFGHIJ0123456789");
        user.salt = "ZZZZZZZZZZZZZZZZZZZZ".into();
        assert!(!authenticate(Some(&user), "hunter22"));
    }

    #[test]
    fn rejects_non_alphanumeric_even_when_digest_matches() {
        let user = user_with("hunter 22!", "ABCDEFGHIJ0123456789");
        assert!(!authenticate(Some(&user), "hunter 22!"));
        assert!(!authenticate(Some(&user), ""));
    }
}
