use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

/// Accepts `"12"` or `12` and yields `"12"`.
///
/// Question ids arrive as numbers from older quiz documents and as strings
/// ("A1") from newer ones; everything downstream compares them as strings.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

/// A question id as it appears inside quiz documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct QuestionKey(pub String);

impl<'de> Deserialize<'de> for QuestionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number(deserializer).map(QuestionKey)
    }
}

impl QuestionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
