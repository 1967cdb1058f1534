//! Serde adapter encoding big integers as base-10 strings.
//!
//! All big integers cross this system's external boundary as decimal ASCII,
//! so serialized reports use the same representation.

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
