use std::str::FromStr;

use crate::{
    auth::{
        password::{hash_password, weakness},
        repo_types::{Role, UserPatch},
        services::parse_email,
    },
    error::{AppError, AppResult},
    users::dto::UpdateUserRequest,
};

/// Turns an admin edit into a store patch. The password, when present, is hashed here
/// and never leaves this function in plain form.
pub fn user_patch(req: UpdateUserRequest) -> AppResult<UserPatch> {
    let name = match req.name.map(|n| n.trim().to_string()) {
        Some(n) if n.is_empty() => return Err(AppError::validation("name must not be empty")),
        other => other,
    };
    let email = req.email.as_deref().map(parse_email).transpose()?;
    let role = req
        .role
        .as_deref()
        .map(Role::from_str)
        .transpose()
        .map_err(AppError::Validation)?;
    let password_hash = match req.password {
        Some(p) => {
            if let Some(reason) = weakness(&p) {
                return Err(AppError::WeakPassword(reason));
            }
            Some(hash_password(&p)?)
        }
        None => None,
    };
    Ok(UserPatch {
        name,
        email,
        role,
        password_hash,
    })
}
