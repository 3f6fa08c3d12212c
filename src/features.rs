//! Feature extraction for credit default model inference.
//!
//! The descriptor table [`FEATURE_SCHEMA`] fixes the name, type and default
//! of every model input, in the exact column order the classifier was
//! trained on. Form input is coerced field by field against this table.

use crate::error::PredictError;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Number of model inputs.
pub const FEATURE_COUNT: usize = 17;

/// Primitive type of a model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
}

/// A single typed model input value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int(_) => FieldKind::Integer,
            FieldValue::Float(_) => FieldKind::Float,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Int(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// Descriptor of one positional model input.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldValue,
}

impl FieldSpec {
    const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            default: FieldValue::Int(0),
        }
    }

    const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Float,
            default: FieldValue::Float(0.0),
        }
    }

    /// Coerce a raw form value to this field's type.
    ///
    /// Absent, empty, unparsable and non-finite input all yield the default.
    pub fn coerce(&self, raw: Option<&str>) -> FieldValue {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.default;
        };

        let parsed = match self.kind {
            FieldKind::Integer => raw.parse::<i64>().ok().map(FieldValue::Int),
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FieldValue::Float),
        };

        parsed.unwrap_or_else(|| {
            debug!(field = self.name, value = %raw, "Malformed value, using default");
            self.default
        })
    }
}

/// Model inputs in training column order.
pub const FEATURE_SCHEMA: [FieldSpec; FEATURE_COUNT] = [
    FieldSpec::int("couple"),
    FieldSpec::int("education"),
    FieldSpec::float("revdispo"),
    FieldSpec::float("montant"),
    FieldSpec::int("age"),
    FieldSpec::int("objet"),
    FieldSpec::float("apport"),
    FieldSpec::int("prt"),
    FieldSpec::int("client"),
    FieldSpec::int("enfant"),
    FieldSpec::int("tempsplein"),
    FieldSpec::int("duree"),
    FieldSpec::int("type"),
    FieldSpec::float("interet"),
    FieldSpec::int("pel"),
    FieldSpec::int("PCS"),
    FieldSpec::int("courant"),
];

/// Feature names in schema order.
pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURE_SCHEMA.iter().map(|spec| spec.name)
}

/// One fixed-order row submitted to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [FieldValue; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from positional values, checking length and types.
    pub fn from_values(values: &[FieldValue]) -> Result<Self, PredictError> {
        if values.len() != FEATURE_COUNT {
            return Err(PredictError::Validation(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                values.len()
            )));
        }

        for (spec, value) in FEATURE_SCHEMA.iter().zip(values) {
            if spec.kind != value.kind() {
                return Err(PredictError::Validation(format!(
                    "feature '{}' expects {:?}, got {:?}",
                    spec.name,
                    spec.kind,
                    value.kind()
                )));
            }
        }

        let mut row = [FieldValue::Int(0); FEATURE_COUNT];
        row.copy_from_slice(values);
        Ok(Self { values: row })
    }

    pub fn values(&self) -> &[FieldValue; FEATURE_COUNT] {
        &self.values
    }

    /// Value of a named field, if it exists in the schema.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        FEATURE_SCHEMA
            .iter()
            .position(|spec| spec.name == name)
            .map(|idx| self.values[idx])
    }

    /// Row as double precision, for native tree evaluation.
    pub fn as_f64(&self) -> [f64; FEATURE_COUNT] {
        self.values.map(|v| v.as_f64())
    }

    /// Row as single precision, for ONNX float tensors.
    pub fn as_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| v.as_f64() as f32).collect()
    }
}

/// Turns submitted form fields into a [`FeatureVector`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Coerce every schema field from the form and assemble the row.
    ///
    /// Fields not in the schema are ignored.
    pub fn extract(&self, form: &HashMap<String, String>) -> Result<FeatureVector, PredictError> {
        let values: Vec<FieldValue> = FEATURE_SCHEMA
            .iter()
            .map(|spec| spec.coerce(form.get(spec.name).map(String::as_str)))
            .collect();

        FeatureVector::from_values(&values)
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The reference applicant row used across tests.
    pub(crate) fn example_form() -> HashMap<String, String> {
        [
            ("couple", "1"),
            ("education", "1"),
            ("revdispo", "25.5"),
            ("montant", "150000000000"),
            ("age", "30"),
            ("objet", "1"),
            ("apport", "20.0"),
            ("prt", "1"),
            ("client", "1"),
            ("enfant", "2"),
            ("tempsplein", "1"),
            ("duree", "5"),
            ("type", "2"),
            ("interet", "3.0"),
            ("pel", "1"),
            ("PCS", "2"),
            ("courant", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_full_form_keeps_schema_order() {
        let vector = FeatureExtractor::new().extract(&example_form()).unwrap();

        assert_eq!(
            vector.as_f64(),
            [
                1.0,
                1.0,
                25.5,
                150_000_000_000.0,
                30.0,
                1.0,
                20.0,
                1.0,
                1.0,
                2.0,
                1.0,
                5.0,
                2.0,
                3.0,
                1.0,
                2.0,
                3.0
            ]
        );
        assert_eq!(vector.get("montant"), Some(FieldValue::Float(150_000_000_000.0)));
        assert_eq!(vector.get("PCS"), Some(FieldValue::Int(2)));
        assert_eq!(vector.get("pcs"), None);
    }

    #[test]
    fn test_each_missing_field_uses_default() {
        let extractor = FeatureExtractor::new();

        for (idx, spec) in FEATURE_SCHEMA.iter().enumerate() {
            let mut form = example_form();
            form.remove(spec.name);

            let vector = extractor.extract(&form).unwrap();
            assert_eq!(vector.values()[idx], spec.default, "field {}", spec.name);
        }
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let mut form = example_form();
        form.insert("age".to_string(), "thirty".to_string());
        form.insert("revdispo".to_string(), "abc".to_string());
        form.insert("duree".to_string(), "5.5".to_string());
        form.insert("interet".to_string(), "NaN".to_string());
        form.insert("enfant".to_string(), "".to_string());

        let vector = FeatureExtractor::new().extract(&form).unwrap();

        assert_eq!(vector.get("age"), Some(FieldValue::Int(0)));
        assert_eq!(vector.get("revdispo"), Some(FieldValue::Float(0.0)));
        assert_eq!(vector.get("duree"), Some(FieldValue::Int(0)));
        assert_eq!(vector.get("interet"), Some(FieldValue::Float(0.0)));
        assert_eq!(vector.get("enfant"), Some(FieldValue::Int(0)));
    }

    #[test]
    fn test_coerce_trims_and_accepts_integral_floats() {
        let age = FEATURE_SCHEMA[4];
        assert_eq!(age.coerce(Some(" 42 ")), FieldValue::Int(42));

        let montant = FEATURE_SCHEMA[3];
        assert_eq!(montant.coerce(Some("1500")), FieldValue::Float(1500.0));
        assert_eq!(montant.coerce(None), FieldValue::Float(0.0));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let mut form = example_form();
        form.insert("submit".to_string(), "Predict".to_string());

        let vector = FeatureExtractor::new().extract(&form).unwrap();
        assert_eq!(vector, FeatureExtractor::new().extract(&example_form()).unwrap());
    }

    #[test]
    fn test_from_values_rejects_bad_rows() {
        let short = vec![FieldValue::Int(0); 3];
        assert!(matches!(
            FeatureVector::from_values(&short),
            Err(PredictError::Validation(_))
        ));

        let wrong_kind = vec![FieldValue::Int(0); FEATURE_COUNT];
        assert!(matches!(
            FeatureVector::from_values(&wrong_kind),
            Err(PredictError::Validation(_))
        ));
    }

    #[test]
    fn test_schema_names() {
        let names: Vec<&str> = feature_names().collect();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "couple");
        assert_eq!(names[15], "PCS");
        assert_eq!(names[16], "courant");
    }
}
