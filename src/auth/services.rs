use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo::{DuplicateEmail, UserRepo},
        repo_types::{NewUser, User},
    },
    config::SuperuserConfig,
    error::{AppError, AppResult, FieldErrors},
};

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_NAME_LEN: usize = 255;
pub const EMAIL_TAKEN: &str = "user with this email already exists.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lowercases the domain part; the local part is kept as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub(crate) fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "This field may not be blank.");
    } else if !is_valid_email(email.trim()) {
        errors.add("email", "Enter a valid email address.");
    }
}

pub(crate) fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "This field may not be blank.");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add(
            "name",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        );
    }
}

pub(crate) fn check_password(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "This field may not be blank.");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
    }
}

/// A lost race on the unique email reads like the up-front check.
pub(crate) fn email_taken(e: anyhow::Error) -> AppError {
    if e.is::<DuplicateEmail>() {
        AppError::field("email", EMAIL_TAKEN)
    } else {
        AppError::Internal(e)
    }
}

/// Optional attributes for `create_user`.
#[derive(Debug, Clone, Default)]
pub struct UserExtra {
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Normalizes the email, hashes the password and stores the user.
pub async fn create_user(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
    extra: UserExtra,
) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::field("email", "Users must have an email address."));
    }

    let password_hash = hash_password(password)?;
    let user = users
        .insert(NewUser {
            email,
            name: extra.name,
            password_hash,
            is_staff: extra.is_staff,
            is_superuser: extra.is_superuser,
        })
        .await
        .map_err(email_taken)?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn create_superuser(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
    name: &str,
) -> AppResult<User> {
    create_user(
        users,
        email,
        password,
        UserExtra {
            name: name.to_string(),
            is_staff: true,
            is_superuser: true,
        },
    )
    .await
}

/// Creates the configured superuser unless the email is already taken.
pub async fn ensure_superuser(users: &dyn UserRepo, cfg: &SuperuserConfig) -> AppResult<()> {
    let email = normalize_email(&cfg.email);
    if users.find_by_email(&email).await?.is_some() {
        info!(%email, "superuser already present");
        return Ok(());
    }
    let user = create_superuser(users, &email, &cfg.password, &cfg.name).await?;
    info!(user_id = %user.id, "superuser provisioned");
    Ok(())
}

/// Resolves credentials to an active user. Unknown email, wrong password and
/// inactive account all come back as `None`.
pub async fn authenticate(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(None);
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Ok(None);
    }

    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRepo;

    #[test]
    fn email_format_check() {
        assert!(is_valid_email("test@oreo.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("user@localhost"));
    }

    #[test]
    fn normalize_lowercases_only_the_domain() {
        assert_eq!(normalize_email("oreo@OREO.com"), "oreo@oreo.com");
        assert_eq!(normalize_email("  Mixed@Example.ORG "), "Mixed@example.org");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn password_rules() {
        let mut errors = FieldErrors::new();
        check_password(&mut errors, "pw");
        assert!(errors.get("password").is_some());

        let mut errors = FieldErrors::new();
        check_password(&mut errors, "hello_999");
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn create_user_with_email_successful() {
        let repo = MemoryRepo::new();
        let user = create_user(&repo, "test@example.com", "hello_999", UserExtra::default())
            .await
            .unwrap();
        assert_eq!(user.email, "test@example.com");
        assert!(verify_password("hello_999", &user.password_hash).unwrap());
        assert!(!serde_json::to_string(&user).unwrap().contains("password"));
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[tokio::test]
    async fn create_user_normalizes_email() {
        let repo = MemoryRepo::new();
        let user = create_user(&repo, "oreo@OREO.com", "hello_999", UserExtra::default())
            .await
            .unwrap();
        assert_eq!(user.email, "oreo@oreo.com");
        assert_eq!(user.to_string(), "oreo@oreo.com");
    }

    #[tokio::test]
    async fn create_user_rejects_empty_email() {
        let repo = MemoryRepo::new();
        let err = create_user(&repo, "", "hello_999", UserExtra::default())
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("email").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = create_user(&repo, "   ", "hello_999", UserExtra::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_superuser_sets_flags() {
        let repo = MemoryRepo::new();
        let user = create_superuser(&repo, "admin@example.com", "hello_999", "admin")
            .await
            .unwrap();
        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn ensure_superuser_is_idempotent() {
        let repo = MemoryRepo::new();
        let cfg = SuperuserConfig {
            email: "root@Example.com".into(),
            password: "hello_999".into(),
            name: "root".into(),
        };
        ensure_superuser(&repo, &cfg).await.unwrap();
        ensure_superuser(&repo, &cfg).await.unwrap();

        let user = repo.find_by_email("root@example.com").await.unwrap().unwrap();
        assert!(user.is_superuser);
        assert_eq!(repo.user_count().await, 1);
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let repo = MemoryRepo::new();
        create_user(&repo, "helo@world.com", "testpass", UserExtra::default())
            .await
            .unwrap();

        assert!(authenticate(&repo, "helo@world.com", "testpass")
            .await
            .unwrap()
            .is_some());
        assert!(authenticate(&repo, "helo@WORLD.com", "testpass")
            .await
            .unwrap()
            .is_some());
        assert!(authenticate(&repo, "helo@world.com", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(authenticate(&repo, "nobody@world.com", "testpass")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn authenticate_rejects_inactive_user() {
        let repo = MemoryRepo::new();
        let user = create_user(&repo, "idle@world.com", "testpass", UserExtra::default())
            .await
            .unwrap();
        repo.set_active(user.id, false).await;

        assert!(authenticate(&repo, "idle@world.com", "testpass")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_an_email_error() {
        let repo = MemoryRepo::new();
        create_user(&repo, "twice@world.com", "testpass", UserExtra::default())
            .await
            .unwrap();

        let err = create_user(&repo, "twice@WORLD.com", "otherpass", UserExtra::default())
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors.get("email"), Some(&[EMAIL_TAKEN.to_string()][..]))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(repo.user_count().await, 1);
    }

    #[test]
    fn other_repo_errors_stay_internal() {
        let err = email_taken(anyhow::anyhow!("connection reset"));
        assert!(matches!(err, AppError::Internal(_)));
        let err = email_taken(DuplicateEmail("a@b.co".into()).into());
        assert!(matches!(err, AppError::Validation(_)));
    }
}
