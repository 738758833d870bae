use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ClaimId, UserId};

//
// ─── TREATMENT TYPE ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatmentType {
    Outpatient,
    Inpatient,
}

impl TreatmentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TreatmentType::Outpatient => "outpatient",
            TreatmentType::Inpatient => "inpatient",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "outpatient" => Some(TreatmentType::Outpatient),
            "inpatient" => Some(TreatmentType::Inpatient),
            _ => None,
        }
    }
}

//
// ─── FIELD ERRORS ──────────────────────────────────────────────────────────────
//

/// One rejected form field, keyed by its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClaimValidationError {
    #[error("claim form has {} invalid field(s)", .0.len())]
    Fields(Vec<FieldError>),
}

impl ClaimValidationError {
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        match self {
            ClaimValidationError::Fields(fields) => fields,
        }
    }
}

/// Collects field errors while pulling validated values out of a form.
#[derive(Default)]
pub(crate) struct FieldCheck {
    errors: Vec<FieldError>,
}

impl FieldCheck {
    pub(crate) fn required(
        &mut self,
        field: &'static str,
        value: &str,
        message: &'static str,
    ) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.reject(field, message);
        }
        trimmed.to_string()
    }

    pub(crate) fn reject(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    pub(crate) fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Claim form exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimDraft {
    pub name: String,
    pub rrn_front: String,
    pub rrn_back: String,
    pub address: String,
    pub job: String,
    pub accident_date: String,
    pub accident_location: String,
    pub accident_type: String,
    pub accident_desc: String,
    pub injury_part: String,
    pub hospital_name: String,
    pub hospital_location: String,
    pub treatment_type: String,
    pub first_visit_date: String,
    pub case_number: Option<String>,
}

/// A claim that passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaim {
    pub name: String,
    pub rrn_front: String,
    pub rrn_back: String,
    pub address: String,
    pub job: String,
    pub accident_date: DateTime<Utc>,
    pub accident_location: String,
    pub accident_type: String,
    pub accident_desc: String,
    pub injury_part: String,
    pub hospital_name: String,
    pub hospital_location: String,
    pub treatment_type: TreatmentType,
    pub first_visit_date: NaiveDate,
    pub case_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClaimDraft {
    /// Validate every field, reporting all failures at once.
    ///
    /// # Errors
    ///
    /// Returns `ClaimValidationError::Fields` listing each invalid field.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedClaim, ClaimValidationError> {
        let mut check = FieldCheck::default();

        let name = check.required("name", &self.name, "name is required");
        let rrn_front = self.rrn_front.trim().to_string();
        if rrn_front.len() != 6 || !rrn_front.chars().all(|c| c.is_ascii_digit()) {
            check.reject("rrnFront", "first six digits of the resident number are required");
        }
        let rrn_back = check.required(
            "rrnBack",
            &self.rrn_back,
            "first digit of the resident number suffix is required",
        );
        let address = check.required("address", &self.address, "address is required");
        let job = check.required("job", &self.job, "occupation is required");

        let accident_date = parse_accident_date(&self.accident_date);
        if accident_date.is_none() {
            check.reject("accidentDate", "accident date and time are required");
        }

        let accident_location = check.required(
            "accidentLocation",
            &self.accident_location,
            "accident location is required",
        );
        let accident_type =
            check.required("accidentType", &self.accident_type, "accident type is required");
        let accident_desc = check.required(
            "accidentDesc",
            &self.accident_desc,
            "accident description is required",
        );
        let injury_part =
            check.required("injuryPart", &self.injury_part, "injured body part is required");
        let hospital_name =
            check.required("hospitalName", &self.hospital_name, "hospital name is required");
        let hospital_location = check.required(
            "hospitalLocation",
            &self.hospital_location,
            "hospital location is required",
        );

        let treatment_type = TreatmentType::parse(self.treatment_type.trim());
        if treatment_type.is_none() {
            check.reject("treatmentType", "treatment type must be outpatient or inpatient");
        }

        let first_visit_date =
            NaiveDate::parse_from_str(self.first_visit_date.trim(), "%Y-%m-%d").ok();
        if first_visit_date.is_none() {
            check.reject("firstVisitDate", "first visit date is required");
        }

        let errors = check.into_errors();
        match (accident_date, treatment_type, first_visit_date) {
            (Some(accident_date), Some(treatment_type), Some(first_visit_date))
                if errors.is_empty() =>
            {
                Ok(ValidatedClaim {
                    name,
                    rrn_front,
                    rrn_back,
                    address,
                    job,
                    accident_date,
                    accident_location,
                    accident_type,
                    accident_desc,
                    injury_part,
                    hospital_name,
                    hospital_location,
                    treatment_type,
                    first_visit_date,
                    case_number: self
                        .case_number
                        .map(|val| val.trim().to_string())
                        .filter(|val| !val.is_empty()),
                    created_at: now,
                })
            }
            _ => Err(ClaimValidationError::Fields(errors)),
        }
    }
}

/// Accepts RFC 3339 or the `YYYY-MM-DDTHH:MM` form of a datetime-local input (read as UTC).
#[must_use]
pub fn parse_accident_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

//
// ─── STORED CLAIM ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: ClaimId,
    pub user_id: UserId,
    pub name: String,
    pub address: String,
    pub job: String,
    pub accident_date: DateTime<Utc>,
    pub accident_location: String,
    pub accident_type: String,
    pub accident_desc: String,
    pub injury_part: String,
    pub hospital_name: String,
    pub hospital_location: String,
    pub treatment_type: TreatmentType,
    pub first_visit_date: NaiveDate,
    pub case_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedClaim {
    /// Attach storage identity. Resident-number parts are not carried on `Claim`.
    #[must_use]
    pub fn assign_id(self, id: ClaimId, user_id: UserId) -> Claim {
        Claim {
            id,
            user_id,
            name: self.name,
            address: self.address,
            job: self.job,
            accident_date: self.accident_date,
            accident_location: self.accident_location,
            accident_type: self.accident_type,
            accident_desc: self.accident_desc,
            injury_part: self.injury_part,
            hospital_name: self.hospital_name,
            hospital_location: self.hospital_location,
            treatment_type: self.treatment_type,
            first_visit_date: self.first_visit_date,
            case_number: self.case_number,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn complete_draft() -> ClaimDraft {
        ClaimDraft {
            name: "Kim Hyundai".into(),
            rrn_front: "900101".into(),
            rrn_back: "1".into(),
            address: "Seoul, Jongno-gu".into(),
            job: "office worker".into(),
            accident_date: "2025-12-15T11:11".into(),
            accident_location: "Sejong-daero intersection".into(),
            accident_type: "vehicle-to-vehicle".into(),
            accident_desc: "rear-ended at a red light".into(),
            injury_part: "neck".into(),
            hospital_name: "Seoul General".into(),
            hospital_location: "Seoul".into(),
            treatment_type: "outpatient".into(),
            first_visit_date: "2025-12-16".into(),
            case_number: Some(" 2512051243-02 ".into()),
        }
    }

    #[test]
    fn valid_draft_normalizes_fields() {
        let claim = complete_draft().validate(fixed_now()).unwrap();
        assert_eq!(claim.treatment_type, TreatmentType::Outpatient);
        assert_eq!(claim.case_number.as_deref(), Some("2512051243-02"));
        assert_eq!(
            claim.accident_date.to_rfc3339(),
            "2025-12-15T11:11:00+00:00"
        );
        assert_eq!(
            claim.first_visit_date,
            NaiveDate::from_ymd_opt(2025, 12, 16).unwrap()
        );
    }

    #[test]
    fn collects_every_invalid_field() {
        let draft = ClaimDraft {
            rrn_front: "12345".into(),
            address: "   ".into(),
            treatment_type: "day-care".into(),
            ..complete_draft()
        };

        let err = draft.validate(fixed_now()).unwrap_err();
        let fields: Vec<&str> = err.fields().iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["rrnFront", "address", "treatmentType"]);
    }

    #[test]
    fn empty_draft_rejects_all_required_fields() {
        let err = ClaimDraft::default().validate(fixed_now()).unwrap_err();
        assert_eq!(err.fields().len(), 14);
    }

    #[test]
    fn blank_case_number_is_dropped() {
        let draft = ClaimDraft {
            case_number: Some("  ".into()),
            ..complete_draft()
        };
        assert_eq!(draft.validate(fixed_now()).unwrap().case_number, None);
    }

    #[test]
    fn accident_date_accepts_rfc3339() {
        let parsed = parse_accident_date("2025-12-15T11:11:00+09:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-12-15T02:11:00+00:00");
        assert!(parse_accident_date("yesterday").is_none());
    }
}
