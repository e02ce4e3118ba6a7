//! Typed views over the provisioning API's site-details document.
//!
//! The remote API returns loosely shaped JSON:
//!
//! ```json
//! {
//!   "Results": [
//!     {
//!       "Site": "NYC",
//!       "CM": "CM1",
//!       "Ranges": [
//!         { "Type": "internal", "LowerBound": "1000", "UpperBound": "1999",
//!           "AvailableExtensions": ["1001", "1002"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Only the outer shape (`Results` must be an array) is fatal. Individual
//! results and ranges are kept even when incomplete so the reconciliation
//! engine can skip them one at a time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PayloadError, Result};

/// A physical location known to the site registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "siteName")]
    pub site_name: String,
}

impl Site {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }
}

/// One site-details response from the provisioning API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteDetailsPayload {
    pub results: Vec<SiteResult>,
}

impl SiteDetailsPayload {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(PayloadError::NotAnObject("site details payload"));
        };
        let results = map
            .remove("Results")
            .filter(|v| !v.is_null())
            .ok_or(PayloadError::MissingField("Results"))?;
        let Value::Array(items) = results else {
            return Err(PayloadError::invalid_field("Results", "expected an array"));
        };
        Ok(Self {
            results: items.into_iter().map(SiteResult::from_value).collect(),
        })
    }

    /// Distinct, non-blank call-manager names in first-seen order.
    pub fn cm_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for cm in self.results.iter().filter_map(|r| r.cm.as_deref()) {
            if !names.contains(&cm) {
                names.push(cm);
            }
        }
        names
    }
}

impl TryFrom<Value> for SiteDetailsPayload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// One `(Site, CM)` block with its number ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteResult {
    pub site: Option<String>,
    pub cm: Option<String>,
    pub ranges: Vec<RangeEntry>,
}

impl SiteResult {
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let ranges = match map.get("Ranges") {
            Some(Value::Array(items)) => items.iter().map(RangeEntry::from_value).collect(),
            _ => Vec::new(),
        };
        Self {
            site: non_blank(&map, "Site"),
            cm: non_blank(&map, "CM"),
            ranges,
        }
    }
}

/// A number range as reported by the API. Fields are optional until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeEntry {
    pub kind: Option<String>,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub available_extensions: Vec<String>,
}

/// A range whose type and bounds are all present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRange<'a> {
    pub kind: &'a str,
    pub lower_bound: &'a str,
    pub upper_bound: &'a str,
}

impl RangeEntry {
    pub fn new(
        kind: impl Into<String>,
        lower_bound: impl Into<String>,
        upper_bound: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some(kind.into()),
            lower_bound: Some(lower_bound.into()),
            upper_bound: Some(upper_bound.into()),
            available_extensions: Vec::new(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Builds an entry from raw JSON. `Lowerbound`/`Upperbound` are accepted
    /// when the canonical spelling is absent. Non-object values yield an
    /// empty entry that fails validation.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let available_extensions = match map.get("AvailableExtensions") {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => Vec::new(),
        };
        Self {
            kind: field(map, "Type"),
            lower_bound: field(map, "LowerBound").or_else(|| field(map, "Lowerbound")),
            upper_bound: field(map, "UpperBound").or_else(|| field(map, "Upperbound")),
            available_extensions,
        }
    }

    pub fn validate(&self) -> Result<ValidRange<'_>> {
        let kind = present(&self.kind).ok_or(PayloadError::MissingField("Type"))?;
        let lower_bound =
            present(&self.lower_bound).ok_or(PayloadError::MissingField("LowerBound"))?;
        let upper_bound =
            present(&self.upper_bound).ok_or(PayloadError::MissingField("UpperBound"))?;
        Ok(ValidRange {
            kind,
            lower_bound,
            upper_bound,
        })
    }

    /// Trimmed, non-blank extensions in payload order (duplicates kept).
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.available_extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_string)
}

fn non_blank(map: &Map<String, Value>, key: &str) -> Option<String> {
    field(map, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nyc_payload() -> Value {
        json!({
            "Results": [{
                "Site": "NYC",
                "CM": "CM1",
                "Ranges": [{
                    "Type": "internal",
                    "LowerBound": "1000",
                    "UpperBound": "1999",
                    "AvailableExtensions": ["1001", "1002"]
                }]
            }]
        })
    }

    #[test]
    fn test_parse_site_details() {
        let payload = SiteDetailsPayload::from_value(nyc_payload()).unwrap();
        assert_eq!(payload.results.len(), 1);

        let result = &payload.results[0];
        assert_eq!(result.site.as_deref(), Some("NYC"));
        assert_eq!(result.cm.as_deref(), Some("CM1"));
        assert_eq!(
            result.ranges[0],
            RangeEntry::new("internal", "1000", "1999").with_extensions(["1001", "1002"])
        );
    }

    #[test]
    fn test_missing_results_is_classified() {
        let err = SiteDetailsPayload::from_value(json!({"Status": "ok"})).unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("Results")));

        let err = SiteDetailsPayload::from_value(json!({"Results": "nope"})).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidField { field: "Results", .. }));

        let err = SiteDetailsPayload::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, PayloadError::NotAnObject(_)));
    }

    #[test]
    fn test_cm_names_are_distinct_and_non_blank() {
        let payload = SiteDetailsPayload::from_value(json!({
            "Results": [
                {"Site": "NYC", "CM": " CM1 "},
                {"Site": "NYC", "CM": ""},
                {"Site": "NYC"},
                {"Site": "NYC", "CM": "CM2"},
                {"Site": "NYC", "CM": "CM1"}
            ]
        }))
        .unwrap();
        assert_eq!(payload.cm_names(), vec!["CM1", "CM2"]);
    }

    #[test]
    fn test_lowercase_bound_keys_are_accepted() {
        let entry = RangeEntry::from_value(&json!({
            "Type": "external",
            "Lowerbound": "2000",
            "Upperbound": "2099"
        }));
        let valid = entry.validate().unwrap();
        assert_eq!(valid.lower_bound, "2000");
        assert_eq!(valid.upper_bound, "2099");
    }

    #[test]
    fn test_canonical_bound_key_wins() {
        let entry = RangeEntry::from_value(&json!({
            "Type": "internal",
            "LowerBound": "1000",
            "Lowerbound": "9999",
            "UpperBound": "1999"
        }));
        assert_eq!(entry.lower_bound.as_deref(), Some("1000"));
    }

    #[test]
    fn test_numeric_bounds_are_stringified() {
        let entry = RangeEntry::from_value(&json!({
            "Type": "internal",
            "LowerBound": 100,
            "UpperBound": 199,
            "AvailableExtensions": [101, " 102 ", null]
        }));
        let valid = entry.validate().unwrap();
        assert_eq!(valid.lower_bound, "100");
        assert_eq!(entry.extensions().collect::<Vec<_>>(), vec!["101", "102"]);
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let entry = RangeEntry::from_value(&json!({"Type": "internal", "UpperBound": "1999"}));
        assert!(matches!(
            entry.validate(),
            Err(PayloadError::MissingField("LowerBound"))
        ));

        let entry = RangeEntry::from_value(&json!("not a range"));
        assert!(matches!(entry.validate(), Err(PayloadError::MissingField("Type"))));
    }

    #[test]
    fn test_extensions_skip_blank() {
        let entry = RangeEntry::new("internal", "1", "9").with_extensions(["  ", "1001", "", " 1002"]);
        assert_eq!(entry.extensions().collect::<Vec<_>>(), vec!["1001", "1002"]);
    }
}
