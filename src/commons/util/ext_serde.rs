//! Defines helper methods for Serializing and Deserializing external types.
use std::{str::FromStr, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::LevelFilter;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

//------------ Bytes ---------------------------------------------------------

pub fn de_bytes<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let some = String::deserialize(d)?;
    BASE64.decode(some.as_bytes()).map_err(de::Error::custom)
}

pub fn ser_bytes<S>(b: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    BASE64.encode(b).serialize(s)
}

//------------ Duration ------------------------------------------------------

/// Durations are kept as a whole number of seconds.
pub fn de_duration_opt<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
}

pub fn ser_duration_opt<S>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.map(|duration| duration.as_secs()).serialize(s)
}

pub fn de_duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(d).map(Duration::from_secs)
}

pub fn ser_duration<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs().serialize(s)
}

//------------ LevelFilter ---------------------------------------------------

pub fn de_level_filter<'de, D>(d: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(d)?;
    LevelFilter::from_str(&string).map_err(de::Error::custom)
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
    struct Holder {
        #[serde(serialize_with = "ser_bytes", deserialize_with = "de_bytes")]
        bytes: Vec<u8>,
        #[serde(
            default,
            serialize_with = "ser_duration_opt",
            deserialize_with = "de_duration_opt"
        )]
        validity: Option<Duration>,
    }

    #[test]
    fn bytes_are_base64_and_durations_are_seconds() {
        let holder = Holder {
            bytes: vec![0, 1, 2, 255],
            validity: Some(Duration::from_secs(86_400)),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"bytes":"AAEC/w==","validity":86400}"#);

        let parsed: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, holder);

        let parsed: Holder = serde_json::from_str(r#"{"bytes":""}"#).unwrap();
        assert_eq!(parsed.validity, None);
    }
}
