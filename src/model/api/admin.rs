use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::db::admin::NewAdmin;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A signup request. Never stored directly, since the password is plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminSignup {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl TryFrom<AdminSignup> for NewAdmin {
    type Error = ();

    /// Convert an [`AdminSignup`] into a storable admin by hashing the
    /// password. Enforces non-empty names, a plausible email address, and
    /// the minimum password length.
    fn try_from(signup: AdminSignup) -> Result<Self, Self::Error> {
        if signup.first_name.is_empty()
            || signup.last_name.is_empty()
            || !signup.email.contains('@')
            || signup.password.len() < MIN_PASSWORD_LENGTH
        {
            return Err(());
        }

        Ok(Self {
            first_name: signup.first_name,
            last_name: signup.last_name,
            email: signup.email,
            password_hash: hash_password(&signup.password),
        })
    }
}

/// Raw login credentials, received from a user. Never stored directly.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

/// Hash a password with a fresh random salt.
///
/// 16 bytes of salt is the recommendation for argon2:
///  https://en.wikipedia.org/wiki/Argon2
pub fn hash_password(password: &str) -> String {
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    // Unwrap safe because the default `Config` is valid.
    argon2::hash_encoded(password.as_bytes(), &salt, &Config::default()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_validation() {
        assert!(NewAdmin::try_from(AdminSignup::example()).is_ok());

        let mut no_first_name = AdminSignup::example();
        no_first_name.first_name.clear();
        assert!(NewAdmin::try_from(no_first_name).is_err());

        let mut bad_email = AdminSignup::example();
        bad_email.email = "not-an-email".to_string();
        assert!(NewAdmin::try_from(bad_email).is_err());

        let mut short_password = AdminSignup::example();
        short_password.password = "1234567".to_string();
        assert!(NewAdmin::try_from(short_password).is_err());
    }

    #[test]
    fn hashes_verify_and_are_salted() {
        let admin = NewAdmin::try_from(AdminSignup::example()).unwrap();
        assert!(admin.verify_password(AdminSignup::example().password));
        assert!(!admin.verify_password("wrong password"));
        // Fresh salts mean the plaintext never appears in the hash.
        assert!(!admin.password_hash.contains("12345678"));
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminSignup {
        pub fn example() -> Self {
            Self {
                first_name: "Sovit".into(),
                last_name: "Chy".into(),
                email: "user.a@example.com".into(),
                password: "12345678".into(),
            }
        }

        pub fn example2() -> Self {
            Self {
                first_name: "Ursula".into(),
                last_name: "Boulanger".into(),
                email: "ursula@example.com".into(),
                password: "totallysecurepassword".into(),
            }
        }
    }

    impl AdminCredentials {
        pub fn example() -> Self {
            let signup = AdminSignup::example();
            Self {
                email: signup.email,
                password: signup.password,
            }
        }

        pub fn example2() -> Self {
            let signup = AdminSignup::example2();
            Self {
                email: signup.email,
                password: signup.password,
            }
        }

        pub fn empty() -> Self {
            Self {
                email: "".into(),
                password: "".into(),
            }
        }
    }
}
