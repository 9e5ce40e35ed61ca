//! Lightweight literal values carried by expressions.
//!
//! The compute layer converts these into its own column types; core only
//! needs them to be comparable and serializable for structural identity.

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(#[serde(with = "float_repr::single")] f32),
    F64(#[serde(with = "float_repr::double")] f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

/// Float literals as plain numbers when finite, tagged strings otherwise.
///
/// JSON has no spelling for NaN or the infinities (`serde_json` writes all
/// three as `null`), and node keys are digests of the JSON form.
mod float_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const POS_INF: &str = "inf";
    const NEG_INF: &str = "-inf";
    const NAN: &str = "nan";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Tag(String),
    }

    fn tag(v: f64) -> &'static str {
        if v.is_nan() {
            NAN
        } else if v > 0.0 {
            POS_INF
        } else {
            NEG_INF
        }
    }

    fn read<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Num(v) => Ok(v),
            Repr::Tag(t) => match t.to_ascii_lowercase().as_str() {
                POS_INF | "+inf" | "infinity" => Ok(f64::INFINITY),
                NEG_INF | "-infinity" => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                _ => Err(D::Error::custom(format!("invalid float literal `{t}`"))),
            },
        }
    }

    pub mod double {
        use super::*;

        pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
            if v.is_finite() {
                s.serialize_f64(*v)
            } else {
                s.serialize_str(tag(*v))
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
            read(d)
        }
    }

    pub mod single {
        use super::*;

        pub fn serialize<S: Serializer>(v: &f32, s: S) -> Result<S::Ok, S::Error> {
            if v.is_finite() {
                s.serialize_f32(*v)
            } else {
                s.serialize_str(tag(f64::from(*v)))
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
            read(d).map(|v| v as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(v: &Scalar) -> String {
        serde_json::to_string(v).unwrap()
    }

    #[test]
    fn non_finite_floats_have_distinct_encodings() {
        let encoded = [
            json(&Scalar::F64(f64::INFINITY)),
            json(&Scalar::F64(f64::NEG_INFINITY)),
            json(&Scalar::F64(f64::NAN)),
            json(&Scalar::F64(0.0)),
            json(&Scalar::F64(-0.0)),
            json(&Scalar::F32(f32::INFINITY)),
        ];
        for (i, a) in encoded.iter().enumerate() {
            for b in &encoded[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!encoded.iter().any(|e| e.contains("null")));
    }

    #[test]
    fn float_literals_read_back() {
        for v in [f64::INFINITY, f64::NEG_INFINITY, 1.5, -0.0] {
            let back: Scalar = serde_json::from_str(&json(&Scalar::F64(v))).unwrap();
            assert_eq!(back, Scalar::F64(v));
        }
        let nan: Scalar = serde_json::from_str(r#"{"F64":"nan"}"#).unwrap();
        assert!(matches!(nan, Scalar::F64(v) if v.is_nan()));
        let int: Scalar = serde_json::from_str(r#"{"F64":10}"#).unwrap();
        assert_eq!(int, Scalar::F64(10.0));
        let small: Scalar = serde_json::from_str(r#"{"F32":"-inf"}"#).unwrap();
        assert_eq!(small, Scalar::F32(f32::NEG_INFINITY));
        assert!(serde_json::from_str::<Scalar>(r#"{"F64":"ten"}"#).is_err());
    }
}
