//! Input validation module

use crate::models::{BookingForm, DocumentType};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Maximum party size accepted on a single booking.
pub const MAX_PAX: i32 = 50;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format")]
    InvalidEmail,

    #[error("DNI must be exactly 8 digits")]
    InvalidDni,

    #[error("Document number must be 6-12 alphanumeric characters")]
    InvalidDocumentNumber,

    #[error("Unknown document type")]
    UnknownDocumentType,
}

/// Booking form after validation, with typed fields.
#[derive(Debug, Clone)]
pub struct ParsedBookingForm {
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub pax: i32,
    pub first_name: String,
    pub last_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
}

/// Validate the booking intake form, collecting one message per failing field
/// so the frontend can highlight them all at once.
pub fn validate_booking_form(
    input: &BookingForm,
) -> Result<ParsedBookingForm, BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();

    let tour_id = match Uuid::parse_str(input.tour_id.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.insert("tour_id".to_string(), "A valid tour is required".to_string());
            None
        }
    };

    let date = match NaiveDate::parse_from_str(input.date.trim(), "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert("date".to_string(), "Date must be YYYY-MM-DD".to_string());
            None
        }
    };

    let time = input.time.trim();
    if time.is_empty() {
        errors.insert("time".to_string(), "Time is required".to_string());
    }

    let pax = match input.pax.trim().parse::<i32>() {
        Ok(p) if (1..=MAX_PAX).contains(&p) => Some(p),
        Ok(_) => {
            errors.insert(
                "pax".to_string(),
                format!("Number of people must be between 1 and {}", MAX_PAX),
            );
            None
        }
        Err(_) => {
            errors.insert("pax".to_string(), "Number of people is required".to_string());
            None
        }
    };

    let first_name = input.first_name.trim();
    if first_name.is_empty() {
        errors.insert("first_name".to_string(), "First name is required".to_string());
    } else if first_name.len() > 100 {
        errors.insert(
            "first_name".to_string(),
            "First name is too long (max 100 characters)".to_string(),
        );
    }

    let last_name = input.last_name.trim();
    if last_name.is_empty() {
        errors.insert("last_name".to_string(), "Last name is required".to_string());
    } else if last_name.len() > 100 {
        errors.insert(
            "last_name".to_string(),
            "Last name is too long (max 100 characters)".to_string(),
        );
    }

    let document_type = match parse_document_type(input.document_type.trim()) {
        Some(dt) => {
            if let Err(e) = validate_document(dt, input.document_number.trim()) {
                errors.insert("document_number".to_string(), e.to_string());
            }
            Some(dt)
        }
        None => {
            errors.insert(
                "document_type".to_string(),
                ValidationError::UnknownDocumentType.to_string(),
            );
            None
        }
    };

    let email = input.email.trim();
    if email.is_empty() {
        errors.insert("email".to_string(), "Email is required".to_string());
    } else if !is_valid_email(email) {
        errors.insert("email".to_string(), ValidationError::InvalidEmail.to_string());
    }

    let phone = input.phone.trim();
    if phone.is_empty() {
        errors.insert("phone".to_string(), "Phone is required".to_string());
    } else if phone.len() > 30 {
        errors.insert("phone".to_string(), "Phone is too long (max 30 characters)".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ParsedBookingForm {
        tour_id: tour_id.unwrap(),
        date: date.unwrap(),
        time: time.to_string(),
        pax: pax.unwrap(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        document_type: document_type.unwrap(),
        document_number: input.document_number.trim().to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        country: input
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from),
    })
}

/// Validate a document number against its type: DNI is exactly 8 digits,
/// CE and passport numbers are 6-12 alphanumeric characters.
pub fn validate_document(
    document_type: DocumentType,
    number: &str,
) -> Result<(), ValidationError> {
    match document_type {
        DocumentType::Dni => {
            if number.len() == 8 && number.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err(ValidationError::InvalidDni)
            }
        }
        DocumentType::Ce | DocumentType::Pasaporte => {
            if (6..=12).contains(&number.len())
                && number.chars().all(|c| c.is_ascii_alphanumeric())
            {
                Ok(())
            } else {
                Err(ValidationError::InvalidDocumentNumber)
            }
        }
    }
}

pub fn parse_document_type(raw: &str) -> Option<DocumentType> {
    match raw.to_lowercase().as_str() {
        "dni" => Some(DocumentType::Dni),
        "ce" => Some(DocumentType::Ce),
        "pasaporte" | "passport" => Some(DocumentType::Pasaporte),
        _ => None,
    }
}

/// Simple email validation
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}

/// Derive a URL-safe slug from a tour title. Generated on create only;
/// updates keep the original slug so published links stay stable.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;

    for c in title.chars() {
        let mapped = match c.to_lowercase().next().unwrap_or(c) {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        };

        if mapped.is_ascii_alphanumeric() {
            slug.push(mapped);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> BookingForm {
        BookingForm {
            tour_id: "6f0d3a9e-74a5-4b1c-90df-2f60a3e3b111".to_string(),
            date: "2026-10-12".to_string(),
            time: "09:00".to_string(),
            pax: "2".to_string(),
            first_name: "Rosa".to_string(),
            last_name: "Quispe".to_string(),
            document_type: "dni".to_string(),
            document_number: "12345678".to_string(),
            email: "rosa@example.com".to_string(),
            phone: "+51 984 123 456".to_string(),
            country: Some("Peru".to_string()),
        }
    }

    #[test]
    fn test_valid_form_parses() {
        let parsed = validate_booking_form(&valid_form()).expect("form should validate");
        assert_eq!(parsed.pax, 2);
        assert_eq!(parsed.document_type, DocumentType::Dni);
        assert_eq!(parsed.country.as_deref(), Some("Peru"));
    }

    #[test]
    fn test_dni_exactly_eight_digits() {
        assert!(validate_document(DocumentType::Dni, "12345678").is_ok());
        assert!(matches!(
            validate_document(DocumentType::Dni, "1234567"),
            Err(ValidationError::InvalidDni)
        ));
        assert!(matches!(
            validate_document(DocumentType::Dni, "123456789"),
            Err(ValidationError::InvalidDni)
        ));
        assert!(matches!(
            validate_document(DocumentType::Dni, "1234567a"),
            Err(ValidationError::InvalidDni)
        ));
    }

    #[test]
    fn test_ce_and_passport_ranges() {
        assert!(validate_document(DocumentType::Ce, "ABC123").is_ok());
        assert!(validate_document(DocumentType::Pasaporte, "P12345678901").is_ok());
        assert!(validate_document(DocumentType::Ce, "AB12").is_err());
        assert!(validate_document(DocumentType::Pasaporte, "P123456789012").is_err());
        assert!(validate_document(DocumentType::Ce, "ABC 123").is_err());
    }

    #[test]
    fn test_short_dni_rejected_with_field_error() {
        let mut form = valid_form();
        form.document_number = "1234567".to_string();
        let errors = validate_booking_form(&form).unwrap_err();
        assert!(errors.contains_key("document_number"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut form = valid_form();
        form.email = "not-an-email".to_string();
        form.pax = "0".to_string();
        form.first_name = "  ".to_string();
        let errors = validate_booking_form(&form).unwrap_err();
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("pax"));
        assert!(errors.contains_key("first_name"));
    }

    #[test]
    fn test_pax_bounds() {
        let mut form = valid_form();
        form.pax = "50".to_string();
        assert!(validate_booking_form(&form).is_ok());
        form.pax = "51".to_string();
        assert!(validate_booking_form(&form).is_err());
        form.pax = "abc".to_string();
        assert!(validate_booking_form(&form).is_err());
    }

    #[test]
    fn test_document_type_parsing() {
        assert_eq!(parse_document_type("DNI"), Some(DocumentType::Dni));
        assert_eq!(parse_document_type("ce"), Some(DocumentType::Ce));
        assert_eq!(parse_document_type("pasaporte"), Some(DocumentType::Pasaporte));
        assert_eq!(parse_document_type("carnet"), None);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.pe"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@domain.com"));
        assert!(!is_valid_email("user@"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Valle Sagrado Full Day"), "valle-sagrado-full-day");
        assert_eq!(slugify("Montaña de 7 Colores"), "montana-de-7-colores");
        assert_eq!(slugify("  Laguna Humantay!  "), "laguna-humantay");
        assert_eq!(slugify("Cañón del Colca"), "canon-del-colca");
    }
}
