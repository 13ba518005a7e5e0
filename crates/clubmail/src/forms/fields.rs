//! Semantic form field names and label classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed set of semantic field names a registration form is probed for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Name,
    RegNo,
    Email,
    Whatsapp,
    Phone,
    Branch,
    Year,
    Gender,
    Hostel,
}

/// Mapping from semantic field names to form-internal field identifiers.
/// Entries exist only for fields actually detected on the form.
pub type FieldMap = BTreeMap<FormField, String>;

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::RegNo => "reg_no",
            FormField::Email => "email",
            FormField::Whatsapp => "whatsapp",
            FormField::Phone => "phone",
            FormField::Year => "year",
            FormField::Branch => "branch",
            FormField::Gender => "gender",
            FormField::Hostel => "hostel",
        }
    }

    /// Classifies a free-text form label. Rules are ordered; the first
    /// matching rule wins; unrecognized labels classify to `None` and are
    /// dropped from the mapping.
    pub fn classify(label: &str) -> Option<FormField> {
        let label = label.to_lowercase();
        let contains_any =
            |needles: &[&str]| needles.iter().any(|needle| label.contains(needle));

        if contains_any(&["name"]) {
            Some(FormField::Name)
        } else if contains_any(&["reg", "roll", "id number", "id no"]) {
            Some(FormField::RegNo)
        } else if contains_any(&["email"]) {
            Some(FormField::Email)
        } else if contains_any(&["whatsapp", "wa"]) {
            Some(FormField::Whatsapp)
        } else if contains_any(&["phone", "mobile", "contact"]) {
            Some(FormField::Phone)
        } else if contains_any(&["branch", "program", "course", "dept"]) {
            Some(FormField::Branch)
        } else if contains_any(&["year", "batch"]) {
            Some(FormField::Year)
        } else if contains_any(&["gender", "sex"]) {
            Some(FormField::Gender)
        } else if contains_any(&["hostel", "staying in", "day scholar"]) {
            Some(FormField::Hostel)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_labels() {
        assert_eq!(FormField::classify("Full Name"), Some(FormField::Name));
        assert_eq!(
            FormField::classify("Registration Number"),
            Some(FormField::RegNo)
        );
        assert_eq!(FormField::classify("Roll No."), Some(FormField::RegNo));
        assert_eq!(
            FormField::classify("College Email ID"),
            Some(FormField::Email)
        );
        assert_eq!(
            FormField::classify("WhatsApp Number"),
            Some(FormField::Whatsapp)
        );
        assert_eq!(
            FormField::classify("Mobile / Contact"),
            Some(FormField::Phone)
        );
        assert_eq!(
            FormField::classify("Branch & Section"),
            Some(FormField::Branch)
        );
        assert_eq!(FormField::classify("Year of Study"), Some(FormField::Year));
        assert_eq!(FormField::classify("Gender"), Some(FormField::Gender));
        assert_eq!(
            FormField::classify("Are you staying in hostel?"),
            Some(FormField::Hostel)
        );
        assert_eq!(
            FormField::classify("Day Scholar or Hosteller"),
            Some(FormField::Hostel)
        );
    }

    #[test]
    fn test_unrecognized_label_is_dropped() {
        assert_eq!(FormField::classify("Favorite Color"), None);
        assert_eq!(FormField::classify(""), None);
    }

    #[test]
    fn test_first_rule_wins() {
        // "name" outranks the hostel rule for a combined label.
        assert_eq!(
            FormField::classify("Hostel name"),
            Some(FormField::Name)
        );
        // "reg" outranks year for "Registration year".
        assert_eq!(
            FormField::classify("Registration year"),
            Some(FormField::RegNo)
        );
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(FormField::classify("EMAIL"), Some(FormField::Email));
        assert_eq!(FormField::classify("gEnDeR"), Some(FormField::Gender));
    }

    #[test]
    fn test_as_str_round_trip_via_serde() {
        let json = serde_json::to_string(&FormField::RegNo).unwrap();
        assert_eq!(json, "\"reg_no\"");
        let parsed: FormField = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FormField::RegNo);
        assert_eq!(parsed.as_str(), "reg_no");
    }
}
