//! Column type classification.
//!
//! Maps the wire-level column type codes reported in result metadata to the
//! closed set of semantic types the result core materializes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Charset number the server reports for binary (non-text) columns.
pub const BINARY_CHARSET: u16 = 63;

/// Charset number used for text columns produced by the in-memory server.
pub const UTF8MB4_CHARSET: u16 = 45;

/// Wire-level column type codes of the binary result protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    NewDate = 14,
    VarChar = 15,
    Bit = 16,
    Json = 245,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

impl FieldType {
    /// Returns the raw wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up a wire code. Returns None for codes this crate does not know.
    pub fn from_code(code: u8) -> Option<Self> {
        let field_type = match code {
            0 => Self::Decimal,
            1 => Self::Tiny,
            2 => Self::Short,
            3 => Self::Long,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::Null,
            7 => Self::Timestamp,
            8 => Self::LongLong,
            9 => Self::Int24,
            10 => Self::Date,
            11 => Self::Time,
            12 => Self::DateTime,
            13 => Self::Year,
            14 => Self::NewDate,
            15 => Self::VarChar,
            16 => Self::Bit,
            245 => Self::Json,
            246 => Self::NewDecimal,
            247 => Self::Enum,
            248 => Self::Set,
            249 => Self::TinyBlob,
            250 => Self::MediumBlob,
            251 => Self::LongBlob,
            252 => Self::Blob,
            253 => Self::VarString,
            254 => Self::String,
            255 => Self::Geometry,
            _ => return None,
        };
        Some(field_type)
    }
}

/// The semantic value types a result column can materialize into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Int32,
    Int64,
    Double,
    String,
    Date,
    DateTime,
    Time,
    Blob,
    Logical,
}

impl SemanticType {
    /// Returns the display name used in column info tables.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int32 => "integer",
            Self::Int64 => "integer64",
            Self::Double => "double",
            Self::String => "string",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Blob => "blob",
            Self::Logical => "logical",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Classifies a wire column type.
///
/// Total over all codes: anything unrecognized is treated as a string.
/// `binary` selects between text and blob for the character/blob codes.
pub fn classify(field_type: u8, binary: bool) -> SemanticType {
    let Some(field_type) = FieldType::from_code(field_type) else {
        return SemanticType::String;
    };

    match field_type {
        FieldType::Tiny
        | FieldType::Short
        | FieldType::Long
        | FieldType::Int24
        | FieldType::Year
        | FieldType::Null => SemanticType::Int32,
        FieldType::LongLong => SemanticType::Int64,
        FieldType::Decimal | FieldType::NewDecimal | FieldType::Float | FieldType::Double => {
            SemanticType::Double
        }
        FieldType::Timestamp | FieldType::DateTime => SemanticType::DateTime,
        FieldType::Date | FieldType::NewDate => SemanticType::Date,
        FieldType::Time => SemanticType::Time,
        FieldType::VarChar
        | FieldType::VarString
        | FieldType::String
        | FieldType::TinyBlob
        | FieldType::MediumBlob
        | FieldType::LongBlob
        | FieldType::Blob => {
            if binary {
                SemanticType::Blob
            } else {
                SemanticType::String
            }
        }
        FieldType::Enum | FieldType::Set | FieldType::Json => SemanticType::String,
        FieldType::Geometry => SemanticType::Blob,
        FieldType::Bit => SemanticType::Logical,
    }
}
