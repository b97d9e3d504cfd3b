//! The type system of spec §3: primitives, composites, geometry, plus the
//! data-lake dialect's fixed timestamp-with-zone precision and the
//! short/long decimal split.

use std::fmt;

/// Decimals with precision <= 18 fit in 64 bits ("short"); above that they
/// need 128-bit ("long") representation. The split is a property of
/// `precision`, not a separate field, so it is computed rather than stored.
pub const SHORT_DECIMAL_MAX_PRECISION: u32 = 18;

/// Timestamp-with-zone precision is fixed in this dialect; see spec §3.
pub const TIMESTAMP_WITH_TIME_ZONE_PRECISION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    /// `precision` <= 18 is a short (64-bit) decimal, otherwise long (128-bit).
    Decimal { precision: u32, scale: u32 },
    Date,
    Time { precision: u32 },
    Timestamp { precision: u32 },
    /// Precision is always [`TIMESTAMP_WITH_TIME_ZONE_PRECISION`] in this
    /// dialect; constructors enforce it.
    TimestampWithTimeZone,
    Varchar { max_len: Option<u32> },
    Char { len: u32 },
    Varbinary,
    Json,
    Uuid,
    IpAddress,
    Interval,
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Row(Vec<(String, Type)>),
    /// Geometry types (non-goal to model topology here; a single opaque
    /// variant carries the geometry subtype name as the original dialect
    /// does for its spatial extension).
    Geometry { subtype: &'static str },
}

impl Type {
    pub fn decimal(precision: u32, scale: u32) -> Type {
        Type::Decimal { precision, scale }
    }

    pub fn timestamp_with_time_zone() -> Type {
        Type::TimestampWithTimeZone
    }

    pub fn is_short_decimal(&self) -> bool {
        matches!(self, Type::Decimal { precision, .. } if *precision <= SHORT_DECIMAL_MAX_PRECISION)
    }

    pub fn is_long_decimal(&self) -> bool {
        matches!(self, Type::Decimal { precision, .. } if *precision > SHORT_DECIMAL_MAX_PRECISION)
    }

    /// Canonical textual signature used for type equality across a rewrite
    /// session (spec §3: "Types have a canonical textual signature used for
    /// equality").
    pub fn signature(&self) -> String {
        match self {
            Type::Boolean => "boolean".to_string(),
            Type::TinyInt => "tinyint".to_string(),
            Type::SmallInt => "smallint".to_string(),
            Type::Integer => "integer".to_string(),
            Type::BigInt => "bigint".to_string(),
            Type::Real => "real".to_string(),
            Type::Double => "double".to_string(),
            Type::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            Type::Date => "date".to_string(),
            Type::Time { precision } => format!("time({precision})"),
            Type::Timestamp { precision } => format!("timestamp({precision})"),
            Type::TimestampWithTimeZone => {
                format!("timestamp({TIMESTAMP_WITH_TIME_ZONE_PRECISION}) with time zone")
            }
            Type::Varchar { max_len: Some(n) } => format!("varchar({n})"),
            Type::Varchar { max_len: None } => "varchar".to_string(),
            Type::Char { len } => format!("char({len})"),
            Type::Varbinary => "varbinary".to_string(),
            Type::Json => "json".to_string(),
            Type::Uuid => "uuid".to_string(),
            Type::IpAddress => "ipaddress".to_string(),
            Type::Interval => "interval".to_string(),
            Type::Array(inner) => format!("array({})", inner.signature()),
            Type::Map(k, v) => format!("map({},{})", k.signature(), v.signature()),
            Type::Row(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, ty)| format!("{name} {}", ty.signature()))
                    .collect();
                format!("row({})", parts.join(","))
            }
            Type::Geometry { subtype } => format!("geometry({subtype})"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
