//! Block explorer API keys.
//!
//! Keys arrive from configuration, often through `${VAR:-}` substitution, so
//! a configured key may be blank. The key text is zeroed on drop and only
//! reachable through [`ApiKey::expose`]; formatting and serialization show a
//! masked form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const MASK: &str = "<redacted>";

/// An explorer API key, trimmed on construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
	pub fn new(key: impl AsRef<str>) -> Self {
		Self(Zeroizing::new(key.as_ref().trim().to_string()))
	}

	/// A key left empty by configuration, unusable for requests.
	pub fn is_blank(&self) -> bool {
		self.0.is_empty()
	}

	/// The key text, for building request parameters.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_blank() {
			f.write_str("ApiKey(<blank>)")
		} else {
			write!(f, "ApiKey({})", MASK)
		}
	}
}

impl Serialize for ApiKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(MASK)
	}
}

impl<'de> Deserialize<'de> for ApiKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = Zeroizing::new(String::deserialize(deserializer)?);
		Ok(Self::new(raw.as_str()))
	}
}
