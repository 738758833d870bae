use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::claim::{ClaimValidationError, FieldCheck, TreatmentType};
use crate::model::ids::{GuaranteeId, UserId};

/// Request for a hospital payment guarantee letter, as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedGuaranteeDraft {
    pub treatment_method: Option<TreatmentType>,
    pub hospital_name: String,
    pub phone_number: Option<String>,
    pub fax_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMedGuarantee {
    pub treatment_method: TreatmentType,
    pub hospital_name: String,
    pub phone_number: Option<String>,
    pub fax_number: String,
    pub requested_at: DateTime<Utc>,
}

impl MedGuaranteeDraft {
    /// Treatment method, hospital name and fax number are mandatory.
    ///
    /// # Errors
    ///
    /// Returns `ClaimValidationError::Fields` listing each missing field.
    pub fn validate(
        self,
        now: DateTime<Utc>,
    ) -> Result<ValidatedMedGuarantee, ClaimValidationError> {
        let mut check = FieldCheck::default();
        if self.treatment_method.is_none() {
            check.reject("treatmentMethod", "treatment method is required");
        }
        let hospital_name = check.required(
            "hospitalName",
            &self.hospital_name,
            "hospital name is required",
        );
        let fax_number = check.required("faxNumber", &self.fax_number, "fax number is required");

        let errors = check.into_errors();
        match self.treatment_method {
            Some(treatment_method) if errors.is_empty() => Ok(ValidatedMedGuarantee {
                treatment_method,
                hospital_name,
                phone_number: self
                    .phone_number
                    .map(|val| val.trim().to_string())
                    .filter(|val| !val.is_empty()),
                fax_number,
                requested_at: now,
            }),
            _ => Err(ClaimValidationError::Fields(errors)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedGuaranteeRequest {
    pub id: GuaranteeId,
    pub user_id: UserId,
    pub treatment_method: TreatmentType,
    pub hospital_name: String,
    pub phone_number: Option<String>,
    pub fax_number: String,
    pub requested_at: DateTime<Utc>,
}

impl ValidatedMedGuarantee {
    #[must_use]
    pub fn assign_id(self, id: GuaranteeId, user_id: UserId) -> MedGuaranteeRequest {
        MedGuaranteeRequest {
            id,
            user_id,
            treatment_method: self.treatment_method,
            hospital_name: self.hospital_name,
            phone_number: self.phone_number,
            fax_number: self.fax_number,
            requested_at: self.requested_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn phone_is_optional() {
        let draft = MedGuaranteeDraft {
            treatment_method: Some(TreatmentType::Inpatient),
            hospital_name: "Seoul General".into(),
            phone_number: Some(" ".into()),
            fax_number: "02-123-4567".into(),
        };
        let valid = draft.validate(fixed_now()).unwrap();
        assert_eq!(valid.phone_number, None);
        assert_eq!(valid.treatment_method, TreatmentType::Inpatient);
    }

    #[test]
    fn reports_missing_required_fields() {
        let err = MedGuaranteeDraft::default()
            .validate(fixed_now())
            .unwrap_err();
        let fields: Vec<&str> = err.fields().iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["treatmentMethod", "hospitalName", "faxNumber"]);
    }
}
