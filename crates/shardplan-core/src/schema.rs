//! Output schemas of plan nodes. Pure data; no Arrow dependency here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date64,
    Timestamp,
    Decimal128,
}

impl DataType {
    /// Parse the type names accepted by the YAML plan DSL.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "Null" | "null" => DataType::Null,
            "Boolean" | "bool" => DataType::Boolean,
            "Int32" | "i32" => DataType::Int32,
            "Int64" | "i64" => DataType::Int64,
            "Float32" | "f32" => DataType::Float32,
            "Float64" | "f64" => DataType::Float64,
            "Utf8" | "str" | "string" => DataType::Utf8,
            "Binary" | "bytes" => DataType::Binary,
            "Date64" | "date" => DataType::Date64,
            "Timestamp" | "datetime" => DataType::Timestamp,
            "Decimal128" | "decimal" => DataType::Decimal128,
            other => return Err(Error::Schema(format!("unknown data type '{other}'"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Ordered column name → type mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only `columns`, in the given order.
    pub fn project(&self, columns: &[String]) -> Result<Schema> {
        let fields = columns
            .iter()
            .map(|c| {
                self.index_of(c)
                    .map(|i| self.fields[i].clone())
                    .ok_or_else(|| Error::Schema(format!("unknown column '{c}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new(fields))
    }

    /// Left fields followed by right fields; right names that clash with a
    /// left name get `suffix` appended.
    pub fn join(&self, right: &Schema, suffix: &str) -> Schema {
        let mut fields = self.fields.clone();
        for f in &right.fields {
            let mut f = f.clone();
            if self.index_of(&f.name).is_some() {
                f.name = format!("{}{}", f.name, suffix);
            }
            fields.push(f);
        }
        Schema::new(fields)
    }
}
