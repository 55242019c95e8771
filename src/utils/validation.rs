//! Validation and normalization utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is strictly positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an amount is zero or more
pub fn validate_non_negative_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(LedgerError::Validation(
            "Amount cannot be negative".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an entity name is present and of sane length
pub fn validate_name(kind: EntityKind, name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(format!(
            "{} name cannot be empty",
            kind
        )));
    }

    if name.chars().count() > 100 {
        return Err(LedgerError::Validation(format!(
            "{} name cannot exceed 100 characters",
            kind
        )));
    }

    Ok(())
}

/// Validate that an entity id is present
pub fn validate_id(id: &str) -> LedgerResult<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::Validation("ID cannot be empty".to_string()));
    }
    Ok(())
}

/// Strip separators and whitespace from an account number
pub fn normalize_account_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '/' && *c != '.')
        .collect()
}

/// Canonical comparison form of a sheba number: separators removed,
/// upper-cased, without the `IR` country prefix
pub fn normalize_sheba(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();
    compact
        .strip_prefix("IR")
        .map(str::to_string)
        .unwrap_or(compact)
}

/// Storage form of a sheba number: `IR` followed by the normalized digits.
/// Empty input stays empty.
pub fn format_sheba(raw: &str) -> String {
    let normalized = normalize_sheba(raw);
    if normalized.is_empty() {
        String::new()
    } else {
        format!("IR{}", normalized)
    }
}

/// Default entity validator with basic rules
pub struct DefaultEntityValidator;

impl EntityValidator for DefaultEntityValidator {
    fn validate_creditor(&self, creditor: &Creditor) -> LedgerResult<()> {
        validate_id(&creditor.id)?;
        validate_name(EntityKind::Creditor, &creditor.name)?;
        validate_non_negative_amount(&creditor.total_amount)
    }

    fn validate_customer(&self, customer: &Customer) -> LedgerResult<()> {
        validate_id(&customer.id)?;
        validate_name(EntityKind::Customer, &customer.name)?;
        validate_non_negative_amount(&customer.expected_amount)
    }

    fn validate_record(&self, record: &ReceiptRecord) -> LedgerResult<()> {
        validate_id(&record.id)?;
        validate_positive_amount(&record.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount(&BigDecimal::from(1)).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());
        assert!(validate_positive_amount(&BigDecimal::from(-5)).is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name(EntityKind::Customer, "Ali").is_ok());
        assert!(validate_name(EntityKind::Customer, "   ").is_err());
        assert!(validate_name(EntityKind::Creditor, &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_sheba_normalization() {
        assert_eq!(normalize_sheba("IR12 0000 0000"), "1200000000");
        assert_eq!(normalize_sheba("ir12-0000"), "120000");
        assert_eq!(normalize_sheba("120000"), "120000");
        assert_eq!(format_sheba("ir12 0000"), "IR120000");
        assert_eq!(format_sheba(""), "");
    }

    #[test]
    fn test_account_normalization() {
        assert_eq!(normalize_account_number(" 0102-3456 789 "), "01023456789");
        assert_eq!(normalize_account_number("6037.9911/22"), "6037991122");
    }

    #[test]
    fn test_default_validator_rejects_negative_debt() {
        let mut creditor = Creditor::new(
            "Sarraf".to_string(),
            String::new(),
            String::new(),
            BigDecimal::from(0),
        );
        assert!(DefaultEntityValidator.validate_creditor(&creditor).is_ok());

        creditor.total_amount = BigDecimal::from(-1);
        assert!(DefaultEntityValidator.validate_creditor(&creditor).is_err());
    }
}
