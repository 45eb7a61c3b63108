use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Custom deserializer for Duration from seconds
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Custom serializer for Duration to seconds
pub fn serialize_duration_to_seconds<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct TestDurationSecs {
        #[serde(
            deserialize_with = "deserialize_duration_from_seconds",
            serialize_with = "serialize_duration_to_seconds"
        )]
        duration: Duration,
    }

    #[test]
    fn test_deserialize_duration_from_seconds() {
        let json = r#"{"duration": 5}"#;
        let expected = TestDurationSecs { duration: Duration::from_secs(5) };
        let actual: TestDurationSecs = serde_json::from_str(json).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_serialize_duration_to_seconds() {
        let data = TestDurationSecs { duration: Duration::from_secs(300) };
        let actual = serde_json::to_string(&data).unwrap();
        assert_eq!(actual, r#"{"duration":300}"#);
    }

    #[test]
    fn test_deserialize_negative_seconds_fails() {
        let json = r#"{"duration": -1}"#;
        let result: Result<TestDurationSecs, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
