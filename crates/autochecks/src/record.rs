//! Service keys and persisted autocheck records.

use std::fmt;

use crate::literal::Value;
use crate::parser::parse_line;

/// Identity of a service on one host: the check type plus an optional item.
///
/// Ordering is by check type, then item, with an absent item sorting first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub check_type: String,
    pub item: Option<String>,
}

impl ServiceKey {
    pub fn new(check_type: impl Into<String>, item: Option<String>) -> Self {
        Self {
            check_type: check_type.into(),
            item,
        }
    }

    /// Key of a service with an item.
    pub fn with_item(check_type: impl Into<String>, item: impl Into<String>) -> Self {
        Self::new(check_type, Some(item.into()))
    }

    /// Key of a service without an item.
    pub fn itemless(check_type: impl Into<String>) -> Self {
        Self::new(check_type, None)
    }

    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    /// Section name of the check type: `lsi` for `lsi.arrays`.
    pub fn section_name(&self) -> &str {
        section_name(&self.check_type)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(f, "{}/{}", self.check_type, item),
            None => f.write_str(&self.check_type),
        }
    }
}

/// Base name of a possibly dotted check type.
pub fn section_name(check_type: &str) -> &str {
    check_type.split('.').next().unwrap_or(check_type)
}

/// One line of an autochecks file.
///
/// The parameter string is the literal text found in (or destined for) the
/// file. It is never evaluated by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocheckRecord {
    pub key: ServiceKey,
    pub paramstring: String,
}

impl AutocheckRecord {
    pub fn new(key: ServiceKey, paramstring: impl Into<String>) -> Self {
        Self {
            key,
            paramstring: paramstring.into(),
        }
    }

    pub fn check_type(&self) -> &str {
        &self.key.check_type
    }

    pub fn item(&self) -> Option<&str> {
        self.key.item()
    }

    /// Render the record as a file line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "  ({}, {}, {}),",
            Value::str(self.key.check_type.as_str()),
            Value::from(self.key.item.as_deref()),
            self.paramstring
        )
    }

    /// Check that the file line of this record reads back as the same record.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.paramstring.trim().is_empty() {
            return Err("empty parameter string".to_string());
        }
        if self.paramstring.contains(['\n', '\r']) {
            return Err("line break in parameter string".to_string());
        }
        match parse_line(&self.to_line()) {
            Ok(Some(parsed)) if parsed == *self => Ok(()),
            Ok(_) => Err(format!(
                "parameter string {:?} does not read back unchanged",
                self.paramstring
            )),
            Err(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_puts_itemless_first() {
        let mut keys = vec![
            ServiceKey::with_item("df", "/var"),
            ServiceKey::itemless("uptime"),
            ServiceKey::with_item("df", "/"),
            ServiceKey::itemless("df"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ServiceKey::itemless("df"),
                ServiceKey::with_item("df", "/"),
                ServiceKey::with_item("df", "/var"),
                ServiceKey::itemless("uptime"),
            ]
        );
    }

    #[test]
    fn test_section_name() {
        assert_eq!(section_name("lsi.arrays"), "lsi");
        assert_eq!(ServiceKey::itemless("uptime").section_name(), "uptime");
    }

    #[test]
    fn test_to_line() {
        let record = AutocheckRecord::new(ServiceKey::with_item("df", "/boot"), "{}");
        assert_eq!(record.to_line(), "  ('df', '/boot', {}),");

        let record = AutocheckRecord::new(ServiceKey::itemless("uptime"), "None");
        assert_eq!(record.to_line(), "  ('uptime', None, None),");
    }

    #[test]
    fn test_validate_rejects_unreadable_lines() {
        let ok = AutocheckRecord::new(ServiceKey::with_item("ps", "proc #1"), "{'user': 'x'}");
        assert!(ok.validate().is_ok());

        let empty = AutocheckRecord::new(ServiceKey::with_item("aaa", "x"), "");
        assert!(empty.validate().unwrap_err().contains("empty"));

        let blank = AutocheckRecord::new(ServiceKey::with_item("aaa", "x"), "   ");
        assert!(blank.validate().is_err());

        let multiline = AutocheckRecord::new(ServiceKey::with_item("aaa", "x"), "{'a': 1,\n 'b': 2}");
        assert!(multiline.validate().unwrap_err().contains("line break"));

        let commented = AutocheckRecord::new(ServiceKey::itemless("aaa"), "5 # five");
        assert!(commented.validate().is_err());

        let padded = AutocheckRecord::new(ServiceKey::itemless("aaa"), " {} ");
        assert!(padded.validate().is_err());

        let no_type = AutocheckRecord::new(ServiceKey::itemless(""), "{}");
        assert!(no_type.validate().is_err());
    }
}
