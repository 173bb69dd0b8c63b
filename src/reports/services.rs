use std::str::FromStr;

use crate::{
    auth::services::is_valid_email,
    error::{AppError, AppResult},
    policy::Principal,
    reports::{
        dto::{CreateReportRequest, UpdateReportRequest},
        repo_types::{NewReport, ReportPatch, Severity},
    },
};

fn required(field: &str, value: String) -> AppResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value)
}

/// A field that may be omitted but, when sent, must not be blank.
fn optional(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    value.map(|v| required(field, v)).transpose()
}

fn contact_email(value: Option<String>) -> AppResult<Option<String>> {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if !is_valid_email(&v) => Err(AppError::validation("Invalid email")),
        other => Ok(other),
    }
}

fn severity(value: &str) -> AppResult<Severity> {
    Severity::from_str(value.trim()).map_err(AppError::Validation)
}

/// Checks a submission and binds it to the caller.
pub fn new_report(submitter: &Principal, req: CreateReportRequest) -> AppResult<NewReport> {
    let email = match req.email {
        Some(e) if e.trim().is_empty() => None,
        other => contact_email(other)?,
    };
    Ok(NewReport {
        submitter_id: submitter.id,
        location: required("location", req.location)?,
        severity: severity(&req.severity)?,
        description: required("description", req.description)?,
        contact_name: required("contact_name", req.contact_name)?,
        phone: required("phone", req.phone)?,
        email,
    })
}

pub fn report_patch(req: UpdateReportRequest) -> AppResult<ReportPatch> {
    Ok(ReportPatch {
        location: optional("location", req.location)?,
        severity: req.severity.as_deref().map(severity).transpose()?,
        description: optional("description", req.description)?,
        contact_name: optional("contact_name", req.contact_name)?,
        phone: optional("phone", req.phone)?,
        email: contact_email(req.email)?,
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::auth::repo_types::Role;

    fn farmer() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Farmer,
        }
    }

    fn request() -> CreateReportRequest {
        CreateReportRequest {
            location: " Riverdale ".into(),
            severity: "Severe".into(),
            description: "Wells are dry".into(),
            contact_name: "Alice".into(),
            phone: "555-0100".into(),
            email: None,
        }
    }

    #[test]
    fn submission_is_trimmed_and_owned_by_caller() {
        let p = farmer();
        let new = new_report(&p, request()).unwrap();
        assert_eq!(new.submitter_id, p.id);
        assert_eq!(new.location, "Riverdale");
        assert_eq!(new.severity, Severity::Severe);
        assert_eq!(new.email, None);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut req = request();
        req.phone = "   ".into();
        let err = new_report(&farmer(), req).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("phone")));
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let mut req = request();
        req.severity = "Apocalyptic".into();
        assert!(matches!(new_report(&farmer(), req), Err(AppError::Validation(_))));
    }

    #[test]
    fn contact_email_must_be_well_formed() {
        let mut req = request();
        req.email = Some("not-an-email".into());
        assert!(matches!(new_report(&farmer(), req), Err(AppError::Validation(_))));

        let mut req = request();
        req.email = Some("".into());
        assert_eq!(new_report(&farmer(), req).unwrap().email, None);
    }

    #[test]
    fn patch_rejects_blank_values_but_allows_omission() {
        let patch = report_patch(UpdateReportRequest::default()).unwrap();
        assert!(patch.location.is_none() && patch.severity.is_none());

        let blank = UpdateReportRequest {
            description: Some("".into()),
            ..Default::default()
        };
        assert!(matches!(report_patch(blank), Err(AppError::Validation(_))));

        let sev = UpdateReportRequest {
            severity: Some("Extreme".into()),
            ..Default::default()
        };
        assert_eq!(report_patch(sev).unwrap().severity, Some(Severity::Extreme));
    }
}
