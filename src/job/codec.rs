//! JSON form of a job configuration.

use super::JobConfiguration;
use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Bumped whenever the serialized layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 2;

pub fn to_json(job: &JobConfiguration) -> Result<String> {
    Ok(serde_json::to_string_pretty(job)?)
}

/// Parse and re-validate a serialized job. The format version is checked
/// before the body so an old layout reports as such rather than as a
/// field-level parse error.
pub fn from_json(text: &str) -> Result<JobConfiguration> {
    let value: Value = serde_json::from_str(text)?;
    let found = value
        .get("format_version")
        .and_then(Value::as_u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0);
    if found != FORMAT_VERSION {
        return Err(ConfigError::UnsupportedFormat {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let job: JobConfiguration = serde_json::from_value(value)?;
    job.validate()?;
    Ok(job)
}

pub fn write_to(job: &JobConfiguration, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_json(job)?)?;
    tracing::debug!("wrote job configuration to {}", path.display());
    Ok(())
}

pub fn read_from(path: impl AsRef<Path>) -> Result<JobConfiguration> {
    let text = fs::read_to_string(path)?;
    from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::Accumulator;
    use crate::component::ComponentSpec;
    use crate::job::{ResolvedValue, materialize};

    #[test]
    fn version_is_checked_first() {
        let text = r#"{"format_version": 7, "services": "not even a list"}"#;
        match from_json(text) {
            Err(ConfigError::UnsupportedFormat { found, expected }) => {
                assert_eq!(found, 7);
                assert_eq!(expected, FORMAT_VERSION);
            }
            other => panic!("expected format error, got {:?}", other),
        }
        assert!(matches!(
            from_json("{}"),
            Err(ConfigError::UnsupportedFormat { found: 0, .. })
        ));
    }

    #[test]
    fn malformed_body_is_a_json_error() {
        let text = format!(r#"{{"format_version": {}, "services": 3}}"#, FORMAT_VERSION);
        assert!(matches!(from_json(&text), Err(ConfigError::Json(_))));
    }

    #[test]
    fn floats_survive_the_round_trip_bit_for_bit() {
        let values = [
            1.0715660391465826e-75,
            -1.81996730402717e-179,
            -1.603964615428183e143,
            f64::MIN_POSITIVE,
            f64::MAX,
            5e-324,
            0.1 + 0.2,
        ];
        let mut acc = Accumulator::new();
        acc.add_service(
            ComponentSpec::service("DummySvc")
                .with_property("Cut", values[0])
                .with_property("Cuts", values.to_vec()),
        )
        .unwrap();
        let job = materialize(&mut acc).unwrap();

        let decoded = from_json(&to_json(&job).unwrap()).unwrap();
        let Some(ResolvedValue::List(cuts)) = decoded.services[0].property("Cuts") else {
            panic!("expected a list of floats");
        };
        for (got, want) in cuts.iter().zip(values) {
            match got {
                ResolvedValue::Float(x) => assert_eq!(x.to_bits(), want.to_bits(), "{} vs {}", x, want),
                other => panic!("expected a float, got {:?}", other),
            }
        }
        assert_eq!(decoded, job);
    }
}
