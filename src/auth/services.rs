use std::str::FromStr;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        codes::{is_well_formed, CodeService},
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password, weakness},
        repo_types::{
            AdminProfile, CodePurpose, DroughtImpact, FarmerProfile, NewUser, NgoProfile, Profile,
            Role, User,
        },
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes and syntax-checks an address taken from a request.
pub(crate) fn parse_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn codes(state: &AppState) -> CodeService<'_> {
    CodeService::new(state.codes.as_ref(), state.config.codes.ttl_minutes)
}

/// Issues a fresh code and hands it to the mailer. A delivery failure is logged; the
/// caller can always ask for another code.
async fn send_code(state: &AppState, email: &str, purpose: CodePurpose) -> AppResult<()> {
    let code = codes(state).issue(email, purpose).await?;
    if let Err(e) = state.mailer.send_code(email, purpose, &code).await {
        error!(error = %e, %email, %purpose, "code delivery failed");
    }
    Ok(())
}

fn signup_profile(role: Role, req: &mut RegisterRequest) -> AppResult<Profile> {
    let phone = non_blank(req.phone.take());
    let location = non_blank(req.location.take());
    match role {
        Role::Farmer => {
            if req.farm_size.is_some_and(|s| !s.is_finite() || s < 0.0) {
                return Err(AppError::validation("farm_size must be a non-negative number"));
            }
            let drought_impact = non_blank(req.drought_impact.take())
                .map(|v| DroughtImpact::from_str(&v))
                .transpose()
                .map_err(AppError::Validation)?;
            Ok(Profile::Farmer(FarmerProfile {
                phone,
                location,
                farm_size: req.farm_size,
                crops: non_blank(req.crops.take()),
                drought_impact,
            }))
        }
        Role::Ngo => {
            let organization_name = non_blank(req.organization_name.take())
                .ok_or_else(|| AppError::validation("organization_name is required"))?;
            Ok(Profile::Ngo(NgoProfile {
                phone,
                location,
                organization_name: Some(organization_name),
                contact_person: non_blank(req.contact_person.take()),
                organization_type: non_blank(req.organization_type.take()),
                focus_areas: non_blank(req.focus_areas.take()),
                description: non_blank(req.description.take()),
            }))
        }
        Role::Admin => Err(AppError::validation("Admin accounts cannot be self-registered")),
    }
}

/// Creates an unconfirmed account, sends its confirmation code and returns the account
/// with a session token. The token is only accepted once the email is confirmed.
/// The protected admin address is never available here.
pub async fn register(state: &AppState, mut req: RegisterRequest) -> AppResult<(User, String)> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let email = parse_email(&req.email)?;
    // reserved for the seeded admin, whether or not it exists yet
    if email == state.config.admin.email {
        warn!(%email, "signup with the protected admin address");
        return Err(AppError::DuplicateEmail);
    }
    if let Some(reason) = weakness(&req.password) {
        warn!(%email, "weak password at signup");
        return Err(AppError::WeakPassword(reason));
    }
    let role = Role::from_str(&req.role).map_err(AppError::Validation)?;
    let profile = signup_profile(role, &mut req)?;

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            profile,
        })
        .await?;

    // the account exists now; resend-confirmation recovers a lost code
    if let Err(e) = send_code(state, &user.email, CodePurpose::ConfirmEmail).await {
        error!(error = %e, user_id = %user.id, "confirmation code not issued");
    }
    let token = JwtKeys::from_ref(state).sign(user.id, user.role())?;
    info!(user_id = %user.id, role = %user.role(), "user registered");
    Ok((user, token))
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<(User, String)> {
    let email = parse_email(&req.email)?;
    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_dummy(&req.password);
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    if !user.confirmed {
        warn!(user_id = %user.id, "login before confirmation");
        return Err(AppError::Unconfirmed);
    }
    let token = JwtKeys::from_ref(state).sign(user.id, user.role())?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

pub async fn confirm_email(state: &AppState, email: &str, code: &str) -> AppResult<()> {
    let email = parse_email(email)?;
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound)?;
    let code = code.trim();
    if !is_well_formed(code) {
        return Err(AppError::InvalidCode);
    }
    codes(state)
        .verify(&email, CodePurpose::ConfirmEmail, code)
        .await?;
    state.users.set_confirmed(user.id).await?;
    info!(user_id = %user.id, "email confirmed");
    Ok(())
}

pub async fn resend_confirmation(state: &AppState, email: &str) -> AppResult<()> {
    let email = parse_email(email)?;
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound)?;
    if user.confirmed {
        return Err(AppError::validation("Email is already confirmed"));
    }
    send_code(state, &email, CodePurpose::ConfirmEmail).await
}

/// Sends a reset code when the account exists. The outcome is the same either way so
/// the endpoint cannot be used to probe for registered addresses.
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let email = parse_email(email)?;
    match state.users.find_by_email(&email).await? {
        Some(user) => {
            send_code(state, &email, CodePurpose::ResetPassword).await?;
            info!(user_id = %user.id, "password reset requested");
        }
        None => debug!(%email, "password reset for unknown email"),
    }
    Ok(())
}

/// Redeeming a reset code also proves control of the address, so the account ends up
/// confirmed.
pub async fn reset_password(
    state: &AppState,
    email: &str,
    code: &str,
    new_password: &str,
) -> AppResult<()> {
    if let Some(reason) = weakness(new_password) {
        return Err(AppError::WeakPassword(reason));
    }
    let email = parse_email(email)?;
    let code = code.trim();
    if !is_well_formed(code) {
        return Err(AppError::InvalidCode);
    }
    // an unknown address looks like a bad code
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCode)?;
    codes(state)
        .verify(&email, CodePurpose::ResetPassword, code)
        .await?;

    let hash = hash_password(new_password)?;
    state.users.set_password(user.id, &hash).await?;
    state.users.set_confirmed(user.id).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Seeds the protected admin account when a password is configured and the account is
/// missing. The seeded account is confirmed from the start. Fails if the protected
/// address is held by a non-admin account.
pub async fn ensure_protected_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = &state.config.admin;
    let Some(password) = admin.password.as_deref() else {
        debug!("ADMIN_PASSWORD not set; skipping admin seed");
        return Ok(());
    };
    if let Some(existing) = state.users.find_by_email(&admin.email).await? {
        if existing.role() != Role::Admin {
            anyhow::bail!(
                "protected address {} belongs to a {} account",
                admin.email,
                existing.role()
            );
        }
        return Ok(());
    }
    let user = state
        .users
        .create(NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(password)?,
            profile: Profile::Admin(AdminProfile::default()),
        })
        .await?;
    state.users.set_confirmed(user.id).await?;
    info!(user_id = %user.id, email = %admin.email, "protected admin seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{repo::CodeStore, repo_types::CodeRecord};

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(parse_email("  A@X.Com ").unwrap(), "a@x.com");
        assert!(matches!(parse_email("nope"), Err(AppError::Validation(_))));
    }

    #[test]
    fn admin_cannot_self_register() {
        let mut req = RegisterRequest::default();
        assert!(matches!(
            signup_profile(Role::Admin, &mut req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn ngo_signup_requires_organization_name() {
        let mut req = RegisterRequest {
            organization_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            signup_profile(Role::Ngo, &mut req),
            Err(AppError::Validation(_))
        ));

        let mut req = RegisterRequest {
            organization_name: Some("Green Aid".into()),
            phone: Some("555-0199".into()),
            ..Default::default()
        };
        let Profile::Ngo(p) = signup_profile(Role::Ngo, &mut req).unwrap() else {
            panic!("expected ngo profile");
        };
        assert_eq!(p.organization_name.as_deref(), Some("Green Aid"));
        assert_eq!(p.phone.as_deref(), Some("555-0199"));
    }

    #[test]
    fn farmer_profile_is_checked() {
        let mut req = RegisterRequest {
            farm_size: Some(-1.0),
            ..Default::default()
        };
        assert!(signup_profile(Role::Farmer, &mut req).is_err());

        let mut req = RegisterRequest {
            drought_impact: Some("total".into()),
            ..Default::default()
        };
        assert!(signup_profile(Role::Farmer, &mut req).is_err());

        let mut req = RegisterRequest {
            farm_size: Some(40.0),
            drought_impact: Some("High".into()),
            ..Default::default()
        };
        let Profile::Farmer(p) = signup_profile(Role::Farmer, &mut req).unwrap() else {
            panic!("expected farmer profile");
        };
        assert_eq!(p.drought_impact, Some(DroughtImpact::High));
    }

    #[tokio::test]
    async fn seeded_admin_is_confirmed_and_seeding_is_repeatable() {
        let state = AppState::fake();
        ensure_protected_admin(&state).await.unwrap();
        ensure_protected_admin(&state).await.unwrap();

        let users = state.users.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role(), Role::Admin);
        assert!(users[0].confirmed);
    }

    #[tokio::test]
    async fn seeding_refuses_a_non_admin_on_the_protected_address() {
        let state = AppState::fake();
        state
            .users
            .create(NewUser {
                name: "Squatter".into(),
                email: state.config.admin.email.clone(),
                password_hash: hash_password("squatter-pass").unwrap(),
                profile: Profile::empty(Role::Farmer),
            })
            .await
            .unwrap();

        assert!(ensure_protected_admin(&state).await.is_err());
    }

    #[tokio::test]
    async fn register_refuses_the_protected_address_in_any_case() {
        let state = AppState::fake();
        let req = RegisterRequest {
            name: "Mallory".into(),
            email: state.config.admin.email.to_uppercase(),
            password: "mallory-password".into(),
            role: "farmer".into(),
            ..Default::default()
        };
        assert!(matches!(register(&state, req).await, Err(AppError::DuplicateEmail)));
        assert!(state.users.list().await.unwrap().is_empty());
    }

    struct UnavailableCodes;

    #[async_trait::async_trait]
    impl CodeStore for UnavailableCodes {
        async fn put(&self, _record: CodeRecord) -> AppResult<()> {
            Err(AppError::Unavailable)
        }
        async fn find(&self, _e: &str, _p: CodePurpose) -> AppResult<Option<CodeRecord>> {
            Err(AppError::Unavailable)
        }
        async fn consume(
            &self,
            _e: &str,
            _p: CodePurpose,
            _c: &str,
            _at: time::OffsetDateTime,
        ) -> AppResult<bool> {
            Err(AppError::Unavailable)
        }
        async fn discard(&self, _e: &str, _p: CodePurpose, _c: &str) -> AppResult<()> {
            Err(AppError::Unavailable)
        }
    }

    #[tokio::test]
    async fn register_succeeds_when_the_code_cannot_be_issued() {
        let base = AppState::fake();
        let state = AppState::from_parts(
            base.config.clone(),
            base.users.clone(),
            base.reports.clone(),
            Arc::new(UnavailableCodes),
            base.mailer.clone(),
        );
        let req = RegisterRequest {
            name: "Alice".into(),
            email: "a@x.com".into(),
            password: "alice-password".into(),
            role: "farmer".into(),
            ..Default::default()
        };
        let (user, token) = register(&state, req).await.unwrap();
        assert!(!token.is_empty());
        assert!(state.users.find_by_id(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_invalid_credentials() {
        let state = AppState::fake();
        let req = LoginRequest {
            email: "nobody@x.com".into(),
            password: "whatever-pass".into(),
        };
        assert!(matches!(login(&state, req).await, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn reset_checks_strength_before_the_code() {
        let state = AppState::fake();
        let res = reset_password(&state, "a@x.com", "1234567", "short").await;
        assert!(matches!(res, Err(AppError::WeakPassword(_))));
    }
}
