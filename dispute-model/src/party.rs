use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One side of a dispute: the MSME supplier or the buyer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub is_msme: bool,
    /// Udyam registration number, mandatory for the MSME side when the
    /// active policy requires registration.
    #[serde(default)]
    pub udyam_number: Option<String>,
    /// Registration scheme the number belongs to, e.g. "Udyam
    /// Registration". Checked against the policy's accepted types.
    #[serde(default)]
    pub registration_type: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Party {
    pub fn msme(name: impl ToString) -> Party {
        Party {
            name: name.to_string(),
            is_msme: true,
            udyam_number: None,
            registration_type: None,
            gstin: None,
            contact_email: None,
            contact_phone: None,
            address: None,
        }
    }

    pub fn buyer(name: impl ToString) -> Party {
        Party {
            is_msme: false,
            ..Party::msme(name)
        }
    }

    pub fn with_registration(mut self, number: impl ToString, kind: impl ToString) -> Party {
        self.udyam_number = Some(number.to_string());
        self.registration_type = Some(kind.to_string());
        self
    }

    pub fn has_registration(&self) -> bool {
        self.udyam_number.is_some()
    }

    pub fn with_gstin(mut self, gstin: impl ToString) -> Party {
        self.gstin = Some(gstin.to_string());
        self
    }
}

/// Evidence attached to a dispute. Verification state is changed only
/// through [`Document::mark_verified`] and [`Document::add_validation_error`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub file_path: String,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub is_verified: bool,
    /// Fields pulled out of the document by the intake pipeline
    /// (invoice numbers, amounts, dates).
    #[serde(default)]
    pub extracted_entities: HashMap<String, Value>,
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

impl Document {
    pub fn new(name: impl ToString, file_path: impl ToString) -> Document {
        Document {
            name: name.to_string(),
            file_path: file_path.to_string(),
            upload_date: None,
            is_mandatory: false,
            is_verified: false,
            extracted_entities: HashMap::new(),
            validation_errors: vec![],
        }
    }

    pub fn verified(name: impl ToString, file_path: impl ToString) -> Document {
        let mut doc = Document::new(name, file_path);
        doc.is_verified = true;
        doc
    }

    pub fn mandatory(mut self) -> Document {
        self.is_mandatory = true;
        self
    }

    pub fn uploaded_at(mut self, at: DateTime<Utc>) -> Document {
        self.upload_date = Some(at);
        self
    }

    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.validation_errors.clear();
    }

    /// Records a verification failure. A document with errors is never
    /// considered verified.
    pub fn add_validation_error(&mut self, error: impl ToString) {
        self.is_verified = false;
        self.validation_errors.push(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_clears_previous_errors() {
        let mut doc = Document::new("invoice", "/tmp/invoice.pdf");
        doc.add_validation_error("Signature missing");

        assert!(!doc.is_verified);
        assert_eq!(doc.validation_errors.len(), 1);

        doc.mark_verified();

        assert!(doc.is_verified);
        assert!(doc.validation_errors.is_empty());
    }

    #[test]
    fn validation_error_revokes_verification() {
        let mut doc = Document::verified("udyam_certificate", "/tmp/udyam.pdf");
        doc.add_validation_error("Certificate expired");

        assert!(!doc.is_verified);
    }

    #[test]
    fn party_builders_set_role() {
        let msme = Party::msme("Sharma Textiles")
            .with_registration("UDYAM-MH-01-0012345", "Udyam Registration");
        let buyer = Party::buyer("BigCorp Retail Ltd");

        assert!(msme.is_msme);
        assert!(!buyer.is_msme);
        assert!(msme.has_registration());
        assert!(!buyer.has_registration());
        assert_eq!(msme.udyam_number.as_deref(), Some("UDYAM-MH-01-0012345"));
    }
}
