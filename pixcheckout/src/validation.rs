//! Checkout form validation and formatting for Brazilian identifiers.
//!
//! CPF (individuals, 11 digits) and CNPJ (companies, 14 digits) both carry two trailing
//! mod-11 check digits. Inputs may contain punctuation (`123.456.789-09`); everything but
//! ASCII digits is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// Strip everything that is not an ASCII digit.
pub fn only_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

pub fn validate_cpf(value: &str) -> bool {
    let d = digits_of(value);
    if d.len() != 11 || (all_same(&d) && d[0] == 0) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = d[..len].iter().enumerate().map(|(i, digit)| digit * (len as u32 + 1 - i as u32)).sum();
        match (sum * 10) % 11 {
            10 | 11 => 0,
            r => r,
        }
    };

    check(9) == d[9] && check(10) == d[10]
}

pub fn validate_cnpj(value: &str) -> bool {
    let d = digits_of(value);
    if d.len() != 14 || (all_same(&d) && d[0] == 0) {
        return false;
    }

    // Weights run from len-7 down to 2, then wrap back to 9.
    let check = |len: usize| -> u32 {
        let mut pos = len as u32 - 7;
        let mut sum = 0;
        for digit in &d[..len] {
            sum += digit * pos;
            pos -= 1;
            if pos < 2 {
                pos = 9;
            }
        }
        if sum % 11 < 2 { 0 } else { 11 - sum % 11 }
    };

    check(12) == d[12] && check(13) == d[13]
}

/// Validates a CPF or CNPJ depending on its digit count.
pub fn validate_document(value: &str) -> bool {
    match only_digits(value).len() {
        11 => validate_cpf(value),
        14 => validate_cnpj(value),
        _ => false,
    }
}

pub fn validate_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Landline (10 digits) or mobile (11 digits) number including area code.
pub fn validate_phone(value: &str) -> bool {
    matches!(only_digits(value).len(), 10 | 11)
}

fn apply_mask(digits: &str, mask: &str) -> String {
    let mut out = String::with_capacity(mask.len());
    let mut chars = digits.chars();
    for m in mask.chars() {
        if m == '0' {
            match chars.next() {
                Some(c) => out.push(c),
                None => break,
            }
        } else {
            out.push(m);
        }
    }
    out
}

/// `000.000.000-00` for CPFs, `00.000.000/0000-00` for CNPJs.
pub fn format_document(value: &str) -> String {
    let digits = only_digits(value);
    if digits.len() <= 11 {
        apply_mask(&digits, "000.000.000-00")
    } else {
        apply_mask(&digits, "00.000.000/0000-00")
    }
}

/// `(00) 00000-0000` for mobiles, `(00) 0000-0000` otherwise.
pub fn format_phone(value: &str) -> String {
    let digits = only_digits(value);
    if digits.len() == 11 {
        apply_mask(&digits, "(00) 00000-0000")
    } else {
        apply_mask(&digits, "(00) 0000-0000")
    }
}

/// Customer data submitted with a checkout.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    /// CPF or CNPJ, punctuation optional
    pub document: String,
    pub phone: String,
}

/// Validate a checkout form, returning one message per invalid field.
pub fn validate_checkout_form(form: &CheckoutForm) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();

    let name = form.name.trim();
    if name.is_empty() {
        errors.insert("name".to_string(), "Nome é obrigatório".to_string());
    } else if name.chars().count() < 3 {
        errors.insert("name".to_string(), "Nome deve ter pelo menos 3 caracteres".to_string());
    }

    if form.email.trim().is_empty() {
        errors.insert("email".to_string(), "Email é obrigatório".to_string());
    } else if !validate_email(form.email.trim()) {
        errors.insert("email".to_string(), "Email inválido".to_string());
    }

    if form.document.trim().is_empty() {
        errors.insert("document".to_string(), "CPF/CNPJ é obrigatório".to_string());
    } else if !validate_document(&form.document) {
        errors.insert("document".to_string(), "CPF/CNPJ inválido".to_string());
    }

    if form.phone.trim().is_empty() {
        errors.insert("phone".to_string(), "Telefone é obrigatório".to_string());
    } else if !validate_phone(&form.phone) {
        errors.insert("phone".to_string(), "Telefone inválido".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cpfs() {
        assert!(validate_cpf("529.982.247-25"));
        assert!(validate_cpf("52998224725"));
        assert!(validate_cpf("111.444.777-35"));
    }

    #[test]
    fn test_invalid_cpfs() {
        assert!(!validate_cpf("529.982.247-24"));
        assert!(!validate_cpf("111.444.777-53"));
        assert!(!validate_cpf("000.000.000-00"));
        assert!(!validate_cpf("1234567890"));
        assert!(!validate_cpf(""));
    }

    #[test]
    fn test_valid_cnpjs() {
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_cnpj("04.252.011/0001-10"));
    }

    #[test]
    fn test_invalid_cnpjs() {
        assert!(!validate_cnpj("11.222.333/0001-82"));
        assert!(!validate_cnpj("11.222.333/0001-91"));
        assert!(!validate_cnpj("00000000000000"));
        assert!(!validate_cnpj("1122233300018"));
    }

    #[test]
    fn test_validate_document_dispatches_on_length() {
        assert!(validate_document("529.982.247-25"));
        assert!(validate_document("11.222.333/0001-81"));
        assert!(!validate_document("123456"));
    }

    #[test]
    fn test_email() {
        assert!(validate_email("cliente@example.com"));
        assert!(validate_email("a.b+c@sub.example.com.br"));
        assert!(!validate_email("cliente@example"));
        assert!(!validate_email("cliente example@x.com"));
        assert!(!validate_email("@example.com"));
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("(11) 98765-4321"));
        assert!(validate_phone("1133334444"));
        assert!(!validate_phone("98765-4321"));
        assert!(!validate_phone("+55 11 98765-4321"));
    }

    #[test]
    fn test_format_document() {
        assert_eq!(format_document("52998224725"), "529.982.247-25");
        assert_eq!(format_document("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_document("5299"), "529.9");
    }

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("1133334444"), "(11) 3333-4444");
    }

    #[test]
    fn test_checkout_form_errors() {
        let form = CheckoutForm {
            name: "Jo".to_string(),
            email: "nope".to_string(),
            document: "52998224725".to_string(),
            phone: "".to_string(),
        };
        let errors = validate_checkout_form(&form);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert_eq!(errors.get("phone").map(String::as_str), Some("Telefone é obrigatório"));

        let form = CheckoutForm {
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            document: "529.982.247-25".to_string(),
            phone: "(11) 98765-4321".to_string(),
        };
        assert!(validate_checkout_form(&form).is_empty());
    }
}
