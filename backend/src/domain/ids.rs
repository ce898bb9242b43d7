//! Strongly typed identifiers shared by every component.
//!
//! Each identifier wraps a UUID, serialises as its canonical string form, and
//! orders by the underlying UUID so keyset batching and tie-breaking are
//! stable across adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The input string was empty.
    Empty {
        /// Identifier kind being parsed.
        kind: &'static str,
    },
    /// The input string was not a valid UUID.
    Invalid {
        /// Identifier kind being parsed.
        kind: &'static str,
    },
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { kind } => write!(f, "{kind} must not be empty"),
            Self::Invalid { kind } => write!(f, "{kind} must be a valid UUID"),
        }
    }
}

impl std::error::Error for IdValidationError {}

macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            /// Validate and construct the identifier from borrowed input.
            pub fn new(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let raw = id.as_ref();
                if raw.is_empty() {
                    return Err(IdValidationError::Empty { kind: $kind });
                }
                if raw.trim() != raw {
                    return Err(IdValidationError::Invalid { kind: $kind });
                }
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|_| IdValidationError::Invalid { kind: $kind })
            }

            /// Wrap an already validated UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

define_uuid_id! {
    /// Role-agnostic account identity supplied by the identity provider.
    AccountId => "account id"
}
define_uuid_id! {
    /// Member (insured person) profile identifier.
    MemberId => "member id"
}
define_uuid_id! {
    /// Doctor profile identifier.
    DoctorId => "doctor id"
}
define_uuid_id! {
    /// Pharmacist profile identifier.
    PharmacistId => "pharmacist id"
}
define_uuid_id! {
    /// Insurer profile identifier.
    InsurerId => "insurer id"
}
define_uuid_id! {
    /// Field agent profile identifier.
    AgentId => "agent id"
}
define_uuid_id! {
    /// Prescription identifier.
    PrescriptionId => "prescription id"
}

/// First eight hex digits of a UUID, used in human-readable references.
pub(crate) fn short_hex(uuid: &Uuid) -> String {
    uuid.simple().to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", IdValidationError::Empty { kind: "member id" })]
    #[case("not-a-uuid", IdValidationError::Invalid { kind: "member id" })]
    #[case(
        " 3fa85f64-5717-4562-b3fc-2c963f66afa6",
        IdValidationError::Invalid { kind: "member id" }
    )]
    fn rejects_malformed_ids(#[case] raw: &str, #[case] expected: IdValidationError) {
        let err = MemberId::new(raw).expect_err("malformed id");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn parses_and_displays_canonical_form() {
        let raw = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
        let id = PrescriptionId::new(raw).expect("valid id");
        assert_eq!(id.to_string(), raw);
    }

    #[rstest]
    fn serde_uses_string_form() {
        let id = AccountId::random();
        let json = serde_json::to_string(&id).expect("serialise id");
        assert_eq!(json, format!("\"{id}\""));
        let back: AccountId = serde_json::from_str(&json).expect("deserialise id");
        assert_eq!(back, id);
    }

    #[rstest]
    fn ordering_follows_uuid_ordering() {
        let low = PharmacistId::from_uuid(Uuid::from_u128(1));
        let high = PharmacistId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }

    #[rstest]
    fn short_hex_takes_eight_digits() {
        let uuid = Uuid::from_u128(0xabcd_ef01_2345_6789_0000_0000_0000_0000);
        assert_eq!(short_hex(&uuid), "abcdef01");
    }
}
