//! Serde bridge between `rust_decimal::Decimal` and BSON Decimal128
//!
//! Money fields are `Decimal` in Rust but must land in MongoDB as BSON
//! `decimal` so the collection validator (`bsonType: "decimal"`) accepts
//! them. Both sides go through their decimal string form, which bson and
//! rust_decimal each parse and print.
//!
//! Use with `#[serde(with = "crate::db::decimal128")]`, or the `option`
//! submodule for optional fields.

use std::str::FromStr;

use bson::Decimal128;
use rust_decimal::Decimal;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

/// Convert a decimal into BSON Decimal128
pub fn to_decimal128(value: Decimal) -> Result<Decimal128, String> {
    Decimal128::from_str(&value.to_string())
        .map_err(|e| format!("cannot store {} as Decimal128: {:?}", value, e))
}

/// Convert BSON Decimal128 into a decimal
///
/// Fails for NaN, infinities, and values outside Decimal's 96-bit/28-digit
/// range. Exponent forms such as `1.5E+4` are expanded.
pub fn from_decimal128(value: &Decimal128) -> Result<Decimal, String> {
    let text = value.to_string();
    Decimal::from_str_exact(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| format!("Decimal128 {} is not a supported decimal: {}", text, e))
}

pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    to_decimal128(*value)
        .map_err(ser::Error::custom)?
        .serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Decimal128::deserialize(deserializer)?;
    from_decimal128(&raw).map_err(de::Error::custom)
}

/// Same bridge for `Option<Decimal>`
pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value
            .map(to_decimal128)
            .transpose()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Decimal128>::deserialize(deserializer)?
            .map(|raw| from_decimal128(&raw).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, Bson};

    #[test]
    fn test_one_matches_reference_encoding() {
        // 0x3040_0000_0000_0000_0000_0000_0000_0001 is canonical "1"
        let encoded = to_decimal128(Decimal::ONE).unwrap();
        let expected = 0x3040_0000_0000_0000_0000_0000_0000_0001u128.to_le_bytes();
        assert_eq!(encoded.bytes(), expected);
    }

    #[test]
    fn test_negative_and_scaled_values() {
        for text in ["-12.50", "25000", "0.0001", "79228162514264337593543950335"] {
            let value = Decimal::from_str(text).unwrap();
            let back = from_decimal128(&to_decimal128(value).unwrap()).unwrap();
            assert_eq!(back, value, "value {}", text);
            assert_eq!(back.scale(), value.scale(), "scale of {}", text);
        }
    }

    #[test]
    fn test_positive_exponent_is_expanded() {
        let raw = Decimal128::from_str("1.5E+4").unwrap();
        assert_eq!(from_decimal128(&raw).unwrap(), Decimal::from(15000));
    }

    #[test]
    fn test_special_values_are_rejected() {
        // Positive infinity: 0x7800...
        let bits = 0x7800_0000_0000_0000_0000_0000_0000_0000u128;
        assert!(from_decimal128(&Decimal128::from_bytes(bits.to_le_bytes())).is_err());
        assert!(from_decimal128(&Decimal128::from_str("NaN").unwrap()).is_err());
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Priced {
        #[serde(with = "super")]
        price: Decimal,
        #[serde(with = "super::option", default, skip_serializing_if = "Option::is_none")]
        deposit: Option<Decimal>,
    }

    #[test]
    fn test_serde_stores_bson_decimal() {
        let priced = Priced {
            price: Decimal::from_str("45000.00").unwrap(),
            deposit: None,
        };
        let document = bson::to_document(&priced).unwrap();
        assert!(matches!(document.get("price"), Some(Bson::Decimal128(_))));
        assert!(!document.contains_key("deposit"));

        let back: Priced = bson::from_document(document).unwrap();
        assert_eq!(back, priced);
    }

    #[test]
    fn test_serde_optional_present() {
        let raw = doc! {
            "price": Bson::Decimal128(to_decimal128(Decimal::from(100)).unwrap()),
            "deposit": Bson::Decimal128(to_decimal128(Decimal::from(200)).unwrap()),
        };
        let priced: Priced = bson::from_document(raw).unwrap();
        assert_eq!(priced.deposit, Some(Decimal::from(200)));
    }
}
