use serde::Deserialize;

/// Admin edit of an account. Absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Sets a new password for the account.
    pub password: Option<String>,
}
