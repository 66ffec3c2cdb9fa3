use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::workflow::dates;

/// Type + domain check for a single slot value. Validation returns the
/// canonical form that is stored and eventually sent to the terminal
/// capability (leave-type code, ISO date, hyphenated lowercase UUID).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotValidator {
    LeaveType,
    Date { allow_past: bool },
    /// A date that must not precede the named earlier slot, when filled.
    DateOnOrAfter { other_slot: &'static str },
    RequestId,
    Text { min_len: usize },
}

impl SlotValidator {
    pub fn validate(
        &self,
        raw: &str,
        filled: &BTreeMap<String, String>,
        today: NaiveDate,
    ) -> Result<String, String> {
        let raw = raw.trim();
        match self {
            Self::LeaveType => canonical_leave_type(raw).ok_or_else(|| {
                format!(
                    "I don't recognize `{raw}` as a leave type. Valid types are CL (casual), \
                     SL (sick), EL (earned), PL (paternity), ML (maternity)."
                )
            }),
            Self::Date { allow_past } => {
                let date = parse_date(raw, today)?;
                if !allow_past && date < today {
                    return Err(format!("{date} is in the past."));
                }
                Ok(date.format("%Y-%m-%d").to_string())
            }
            Self::DateOnOrAfter { other_slot } => {
                let date = parse_date(raw, today)?;
                if let Some(earlier) = filled
                    .get(*other_slot)
                    .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
                {
                    if date < earlier {
                        return Err(format!("{date} is before {earlier}."));
                    }
                }
                Ok(date.format("%Y-%m-%d").to_string())
            }
            Self::RequestId => Uuid::parse_str(raw)
                .map(|id| id.to_string())
                .map_err(|_| format!("`{raw}` doesn't look like a request id.")),
            Self::Text { min_len } => {
                if raw.chars().count() < *min_len {
                    Err("Could you give a little more detail?".to_string())
                } else {
                    Ok(raw.to_string())
                }
            }
        }
    }
}

fn parse_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    dates::resolve(raw, today).ok_or_else(|| {
        format!("I couldn't read `{raw}` as a date. Use YYYY-MM-DD, `today`, or `tomorrow`.")
    })
}

/// Maps spoken leave-type phrases to their codes. Codes themselves are
/// accepted case-insensitively.
pub fn canonical_leave_type(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let normalized = normalized.strip_suffix(" leave").unwrap_or(&normalized);
    let code = match normalized {
        "cl" | "casual" => "CL",
        "sl" | "sick" => "SL",
        "el" | "earned" | "privilege" => "EL",
        "pl" | "paternity" => "PL",
        "ml" | "maternity" => "ML",
        _ => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::{canonical_leave_type, SlotValidator};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 11).expect("valid date")
    }

    fn no_slots() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn leave_type_accepts_codes_and_phrases() {
        for (input, expected) in [
            ("CL", "CL"),
            ("sl", "SL"),
            ("sick", "SL"),
            ("Sick Leave", "SL"),
            ("casual leave", "CL"),
            ("earned", "EL"),
            ("maternity", "ML"),
        ] {
            let value = SlotValidator::LeaveType
                .validate(input, &no_slots(), today())
                .unwrap_or_else(|reason| panic!("{input} should validate: {reason}"));
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn leave_type_rejects_unknown_phrases() {
        let reason = SlotValidator::LeaveType
            .validate("sabbatical", &no_slots(), today())
            .expect_err("sabbatical is not a configured type");
        assert!(reason.contains("sabbatical"));
    }

    #[test]
    fn date_rejects_past_when_configured() {
        let validator = SlotValidator::Date { allow_past: false };
        let reason =
            validator.validate("2025-01-01", &no_slots(), today()).expect_err("past date");
        assert!(reason.contains("past"));
        assert_eq!(validator.validate("today", &no_slots(), today()).as_deref(), Ok("2025-06-11"));
    }

    #[test]
    fn date_canonicalizes_relative_terms() {
        let validator = SlotValidator::Date { allow_past: false };
        assert_eq!(
            validator.validate("tomorrow", &no_slots(), today()).as_deref(),
            Ok("2025-06-12")
        );
    }

    #[test]
    fn end_date_must_not_precede_start() {
        let validator = SlotValidator::DateOnOrAfter { other_slot: "start_date" };
        let mut filled = BTreeMap::new();
        filled.insert("start_date".to_string(), "2025-06-20".to_string());

        let reason = validator.validate("2025-06-15", &filled, today()).expect_err("before start");
        assert!(reason.contains("before"));
        assert_eq!(
            validator.validate("2025-06-20", &filled, today()).as_deref(),
            Ok("2025-06-20")
        );
    }

    #[test]
    fn request_id_canonicalizes_uuids() {
        let value = SlotValidator::RequestId
            .validate("0F81D9C0-9EFD-4E4A-8F2B-4E6B2F1A9D11", &no_slots(), today())
            .expect("valid uuid");
        assert_eq!(value, "0f81d9c0-9efd-4e4a-8f2b-4e6b2f1a9d11");

        assert!(SlotValidator::RequestId.validate("REQ-42", &no_slots(), today()).is_err());
    }

    #[test]
    fn text_requires_minimum_length() {
        let validator = SlotValidator::Text { min_len: 3 };
        assert!(validator.validate("ok", &no_slots(), today()).is_err());
        assert_eq!(
            validator.validate("  family function  ", &no_slots(), today()).as_deref(),
            Ok("family function")
        );
    }

    #[test]
    fn canonical_leave_type_is_case_insensitive() {
        assert_eq!(canonical_leave_type("CASUAL").as_deref(), Some("CL"));
        assert_eq!(canonical_leave_type("nonsense"), None);
    }
}
