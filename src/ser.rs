/// Token amounts travel as decimal strings: JSON numbers round-trip through
/// f64 in too many clients, and 2^53 is far below a uint256.
pub(crate) mod decimal_u256 {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(val: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&val.to_string())
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
