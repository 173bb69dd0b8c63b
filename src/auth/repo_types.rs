use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Ngo,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Farmer, Role::Ngo, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Ngo => "ngo",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "ngo" => Ok(Role::Ngo),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DroughtImpact {
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for DroughtImpact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown drought impact '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmerProfile {
    pub phone: Option<String>,
    pub location: Option<String>,
    /// Acres.
    pub farm_size: Option<f64>,
    pub crops: Option<String>,
    pub drought_impact: Option<DroughtImpact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgoProfile {
    pub phone: Option<String>,
    pub location: Option<String>,
    pub organization_name: Option<String>,
    pub contact_person: Option<String>,
    pub organization_type: Option<String>,
    pub focus_areas: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminProfile {
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// Role-specific account attributes. The variant is the account's role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Farmer(FarmerProfile),
    Ngo(NgoProfile),
    Admin(AdminProfile),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Farmer(_) => Role::Farmer,
            Profile::Ngo(_) => Role::Ngo,
            Profile::Admin(_) => Role::Admin,
        }
    }

    pub fn empty(role: Role) -> Self {
        match role {
            Role::Farmer => Profile::Farmer(FarmerProfile::default()),
            Role::Ngo => Profile::Ngo(NgoProfile::default()),
            Role::Admin => Profile::Admin(AdminProfile::default()),
        }
    }

    fn contact(&self) -> (Option<String>, Option<String>) {
        match self {
            Profile::Farmer(p) => (p.phone.clone(), p.location.clone()),
            Profile::Ngo(p) => (p.phone.clone(), p.location.clone()),
            Profile::Admin(p) => (p.phone.clone(), p.location.clone()),
        }
    }

    /// Re-keys the profile under another role. Phone and location carry over,
    /// fields specific to the old role are dropped.
    pub fn into_role(self, role: Role) -> Self {
        if self.role() == role {
            return self;
        }
        let (phone, location) = self.contact();
        match role {
            Role::Farmer => Profile::Farmer(FarmerProfile { phone, location, ..Default::default() }),
            Role::Ngo => Profile::Ngo(NgoProfile { phone, location, ..Default::default() }),
            Role::Admin => Profile::Admin(AdminProfile { phone, location }),
        }
    }
}

/// User record. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub profile: Profile,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub confirmed: bool,
    pub profile: Json<Profile>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&r.role).map_err(anyhow::Error::msg)?;
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            confirmed: r.confirmed,
            // the role column is authoritative
            profile: r.profile.0.into_role(role),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    /// Already normalized (trimmed, lower-cased).
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(role) = self.role {
            user.profile = user.profile.clone().into_role(role);
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodePurpose {
    ConfirmEmail,
    ResetPassword,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::ConfirmEmail => "confirm_email",
            CodePurpose::ResetPassword => "reset_password",
        }
    }
}

impl fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm_email" => Ok(Self::ConfirmEmail),
            "reset_password" => Ok(Self::ResetPassword),
            other => Err(format!("unknown code purpose '{other}'")),
        }
    }
}

/// One-time numeric code bound to an email address and a purpose.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRecord {
    pub email: String,
    pub purpose: CodePurpose,
    pub code: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}

impl CodeRecord {
    pub fn is_live(&self) -> bool {
        self.consumed_at.is_none()
    }
}

#[derive(Debug, FromRow)]
pub struct CodeRow {
    pub email: String,
    pub purpose: String,
    pub code: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}

impl TryFrom<CodeRow> for CodeRecord {
    type Error = anyhow::Error;

    fn try_from(r: CodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            purpose: CodePurpose::from_str(&r.purpose).map_err(anyhow::Error::msg)?,
            email: r.email,
            code: r.code,
            issued_at: r.issued_at,
            expires_at: r.expires_at,
            consumed_at: r.consumed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Farmer".parse::<Role>().unwrap(), Role::Farmer);
        assert_eq!(" ngo ".parse::<Role>().unwrap(), Role::Ngo);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn profile_serializes_with_role_tag() {
        let p = Profile::Farmer(FarmerProfile {
            farm_size: Some(12.5),
            drought_impact: Some(DroughtImpact::High),
            ..Default::default()
        });
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["role"], "farmer");
        assert_eq!(v["farm_size"], 12.5);
        assert_eq!(v["drought_impact"], "high");

        let back: Profile = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn into_role_keeps_contact_and_drops_role_fields() {
        let p = Profile::Farmer(FarmerProfile {
            phone: Some("555-0100".into()),
            location: Some("Riverdale".into()),
            crops: Some("Sorghum".into()),
            ..Default::default()
        });
        let ngo = p.into_role(Role::Ngo);
        assert_eq!(
            ngo,
            Profile::Ngo(NgoProfile {
                phone: Some("555-0100".into()),
                location: Some("Riverdale".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn stored_profile_is_rekeyed_to_role_column() {
        let row = UserRow {
            id: Uuid::new_v4(),
            name: "N".into(),
            email: "n@x.com".into(),
            password_hash: "h".into(),
            role: "ngo".into(),
            confirmed: true,
            profile: Json(Profile::empty(Role::Farmer)),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let user = User::try_from(row).unwrap();
        assert_eq!(user.role(), Role::Ngo);
    }
}
