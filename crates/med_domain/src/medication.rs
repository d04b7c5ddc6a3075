use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque medication identifier. The page sends numeric primary keys, but
/// any string is accepted so the agent never has to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MedicationId(String);

impl fmt::Display for MedicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for MedicationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for MedicationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for MedicationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Self(value.to_string()),
            RawId::Text(value) => Self(value),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub id: MedicationId,
    #[serde(alias = "pillName")]
    pub pill_name: String,
    #[serde(default)]
    pub times: Vec<String>,
}

impl Medication {
    pub fn new(
        id: impl Into<MedicationId>,
        pill_name: impl Into<String>,
        times: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            pill_name: pill_name.into(),
            times: times.into_iter().map(Into::into).collect(),
        }
    }
}
