use std::sync::OnceLock;

use regex::Regex;

use crate::domain::address::AddressFields;
use crate::domain::customer::{CustomerPatch, NewCustomer};
use crate::errors::{DomainError, FieldViolation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    Required,
    ZipCode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub field: &'static str,
    pub check: Check,
    pub message: &'static str,
}

const fn required(field: &'static str, message: &'static str) -> Rule {
    Rule { field, check: Check::Required, message }
}

pub const CUSTOMER_RULES: &[Rule] = &[
    required("name", "Name is required"),
    required("lastName", "Last name is required"),
    required("email", "Email is required"),
    required("cpf", "CPF is required"),
    required("phone", "Phone is required"),
    required("password", "Password is required"),
    required("birthDate", "Birth date is required"),
];

pub const ADDRESS_RULES: &[Rule] = &[
    required("zipCode", "Zip code is required"),
    Rule {
        field: "zipCode",
        check: Check::ZipCode,
        message: "Invalid zip code format. Use XXXXX-XXX or XXXXXXXX",
    },
    required("street", "Street is required"),
    required("number", "Number is required"),
    required("complement", "Complement is required"),
    required("neighborhood", "Neighborhood is required"),
    required("type", "Type is required"),
    required("city", "City is required"),
    required("state", "State is required"),
    required("country", "Country is required"),
];

/// Exposes named string fields to the rule table.
pub trait FieldSource {
    fn field_value(&self, field: &str) -> Option<&str>;
}

impl FieldSource for NewCustomer {
    fn field_value(&self, field: &str) -> Option<&str> {
        let value = match field {
            "name" => &self.name,
            "lastName" => &self.last_name,
            "email" => &self.email,
            "cpf" => &self.cpf,
            "phone" => &self.phone,
            "password" => &self.password,
            "birthDate" => &self.birth_date,
            _ => return None,
        };
        Some(value.as_str())
    }
}

impl FieldSource for CustomerPatch {
    fn field_value(&self, field: &str) -> Option<&str> {
        let value = match field {
            "name" => &self.name,
            "lastName" => &self.last_name,
            "email" => &self.email,
            "phone" => &self.phone,
            "password" => &self.password,
            "birthDate" => &self.birth_date,
            _ => return None,
        };
        value.as_deref()
    }
}

impl FieldSource for AddressFields {
    fn field_value(&self, field: &str) -> Option<&str> {
        let value = match field {
            "zipCode" => &self.zip_code,
            "street" => &self.street,
            "number" => &self.number,
            "complement" => &self.complement,
            "neighborhood" => &self.neighborhood,
            "type" => &self.address_type,
            "city" => &self.city,
            "state" => &self.state,
            "country" => &self.country,
            _ => return None,
        };
        Some(value.as_str())
    }
}

fn zip_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{5}-\d{3}|\d{8})$").expect("zip code pattern is valid"))
}

pub fn is_valid_zip_code(value: &str) -> bool {
    zip_code_pattern().is_match(value)
}

fn passes(check: Check, value: &str) -> bool {
    match check {
        Check::Required => !value.trim().is_empty(),
        // Blank values are reported by the required rule alone.
        Check::ZipCode => value.trim().is_empty() || is_valid_zip_code(value),
    }
}

/// Runs every rule against `subject` and returns all failures. `prefix` is
/// prepended to field names, e.g. `addresses[0].`.
pub fn evaluate<S: FieldSource + ?Sized>(
    rules: &[Rule],
    subject: &S,
    prefix: &str,
) -> Vec<FieldViolation> {
    rules
        .iter()
        .filter(|rule| !passes(rule.check, subject.field_value(rule.field).unwrap_or_default()))
        .map(|rule| FieldViolation::new(format!("{prefix}{}", rule.field), rule.message))
        .collect()
}

pub fn address_violations(fields: &AddressFields, prefix: &str) -> Vec<FieldViolation> {
    evaluate(ADDRESS_RULES, fields, prefix)
}

pub fn indexed_prefix(index: usize) -> String {
    format!("addresses[{index}].")
}

pub fn validate_address(fields: &AddressFields) -> Result<(), DomainError> {
    into_result(address_violations(fields, ""))
}

pub fn validate_new_customer(customer: &NewCustomer) -> Result<(), DomainError> {
    let mut violations = evaluate(CUSTOMER_RULES, customer, "");
    for (index, address) in customer.addresses.iter().enumerate() {
        violations.extend(address_violations(address, &indexed_prefix(index)));
    }
    into_result(violations)
}

/// Only fields the patch carries are checked; a present field may not be
/// blank.
pub fn customer_patch_violations(patch: &CustomerPatch) -> Vec<FieldViolation> {
    let present: Vec<Rule> = CUSTOMER_RULES
        .iter()
        .filter(|rule| patch.field_value(rule.field).is_some())
        .copied()
        .collect();
    evaluate(&present, patch, "")
}

pub fn into_result(violations: Vec<FieldViolation>) -> Result<(), DomainError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        customer_patch_violations, is_valid_zip_code, validate_address, validate_new_customer,
    };
    use crate::domain::address::AddressFields;
    use crate::domain::customer::{CustomerPatch, NewCustomer};
    use crate::errors::DomainError;

    fn address() -> AddressFields {
        AddressFields {
            zip_code: "12345-678".to_string(),
            street: "Main".to_string(),
            number: "10".to_string(),
            complement: "apt1".to_string(),
            neighborhood: "Centro".to_string(),
            address_type: "home".to_string(),
            city: "SP".to_string(),
            state: "SP".to_string(),
            country: "BR".to_string(),
        }
    }

    fn customer() -> NewCustomer {
        NewCustomer {
            name: "Ana".to_string(),
            last_name: "Silva".to_string(),
            email: "ana@x.com".to_string(),
            cpf: "12345678900".to_string(),
            phone: "+5511999999999".to_string(),
            password: "secret".to_string(),
            status: Some(true),
            birth_date: "1990-01-01".to_string(),
            addresses: vec![address()],
        }
    }

    fn fields(error: DomainError) -> Vec<String> {
        match error {
            DomainError::Validation(violations) => {
                violations.into_iter().map(|violation| violation.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zip_code_accepts_both_formats() {
        assert!(is_valid_zip_code("12345-678"));
        assert!(is_valid_zip_code("12345678"));
        assert!(!is_valid_zip_code("1234-5678"));
        assert!(!is_valid_zip_code("12345-6789"));
        assert!(!is_valid_zip_code("abcde-fgh"));
        assert!(!is_valid_zip_code(" 12345678"));
    }

    #[test]
    fn complete_customer_passes() {
        assert_eq!(validate_new_customer(&customer()), Ok(()));
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let mut payload = customer();
        payload.name = "  ".to_string();
        payload.email.clear();
        payload.addresses[0].street.clear();
        payload.addresses.push(AddressFields { zip_code: "123".to_string(), ..address() });

        let error = validate_new_customer(&payload).expect_err("invalid payload");
        assert_eq!(
            fields(error),
            vec!["name", "email", "addresses[0].street", "addresses[1].zipCode"]
        );
    }

    #[test]
    fn blank_zip_code_reports_required_only() {
        let error = validate_address(&AddressFields { zip_code: String::new(), ..address() })
            .expect_err("blank zip");
        match error {
            DomainError::Validation(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].to_string(), "zipCode: Zip code is required");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn complement_is_required() {
        let error = validate_address(&AddressFields { complement: String::new(), ..address() })
            .expect_err("blank complement");
        assert_eq!(fields(error), vec!["complement"]);
    }

    #[test]
    fn patch_checks_only_present_fields() {
        assert!(customer_patch_violations(&CustomerPatch::default()).is_empty());

        let patch = CustomerPatch {
            name: Some("Bia".to_string()),
            email: Some("  ".to_string()),
            ..CustomerPatch::default()
        };
        let violations = customer_patch_violations(&patch);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "email");
        assert_eq!(violations[0].message, "Email is required");
    }
}
