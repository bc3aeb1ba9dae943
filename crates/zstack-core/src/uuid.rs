//! Strongly-typed UUID wrappers for ZStack resources.
//!
//! ZStack identifies every inventory object by a UUID written in the 32-digit
//! "simple" form (no hyphens). The wrappers accept either form on input and always
//! emit the simple form, so values round-trip through the management API unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Macro to generate strongly-typed UUID wrapper types.
macro_rules! uuid_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new UUID wrapper from a [`Uuid`].
            #[must_use]
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Creates a new random UUID (v4).
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner [`Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parses a UUID in simple or hyphenated form.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID.
            pub fn parse_str(input: &str) -> Result<Self> {
                validate_uuid(input).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0.simple())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse_str(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

uuid_type!(VmUuid, "VM instance UUID");
uuid_type!(ZoneUuid, "Zone UUID");
uuid_type!(ClusterUuid, "Cluster UUID");
uuid_type!(HostUuid, "Physical host UUID");
uuid_type!(ImageUuid, "Image UUID");
uuid_type!(InstanceOfferingUuid, "Instance offering UUID");
uuid_type!(DiskOfferingUuid, "Disk offering UUID");
uuid_type!(L3NetworkUuid, "L3 network UUID");
uuid_type!(NicUuid, "VM NIC UUID");
uuid_type!(VolumeUuid, "Volume UUID");
uuid_type!(PrimaryStorageUuid, "Primary storage UUID");
uuid_type!(AccountUuid, "Account UUID");
uuid_type!(UserUuid, "IAM user UUID");

/// Validates a UUID string in simple or hyphenated form.
///
/// # Errors
///
/// Returns an error if the string is not a valid UUID.
pub fn validate_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::InvalidUuid(s.to_string()))
}

/// Deserialize an optional UUID field, treating `null` and `""` as absent.
///
/// The management API sends empty strings for unset references. Use with
/// `#[serde(default, deserialize_with = "...")]`.
///
/// # Errors
///
/// Returns a deserialization error if a non-empty value is not a valid UUID.
pub fn deserialize_optional<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_UUID: &str = "550e8400e29b41d4a716446655440000";
    const HYPHENATED_UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_parse_simple_form() {
        let vm = VmUuid::parse_str(SIMPLE_UUID).unwrap();
        assert_eq!(vm.to_string(), SIMPLE_UUID);
    }

    #[test]
    fn test_parse_hyphenated_form_displays_simple() {
        let vm: VmUuid = HYPHENATED_UUID.parse().unwrap();
        assert_eq!(vm.to_string(), SIMPLE_UUID);
    }

    #[test]
    fn test_parse_invalid() {
        let err = HostUuid::parse_str("not-a-uuid").unwrap_err();
        assert!(matches!(err, Error::InvalidUuid(_)));
        assert_eq!(err.error_code(), "INVALID_UUID");
    }

    #[test]
    fn test_serialize_uses_simple_form() {
        let zone = ZoneUuid::parse_str(HYPHENATED_UUID).unwrap();
        let json = serde_json::to_string(&zone).unwrap();
        assert_eq!(json, format!("\"{SIMPLE_UUID}\""));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let result = serde_json::from_str::<ImageUuid>("\"zzz\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_new_v4_round_trips_through_display() {
        let account = AccountUuid::new_v4();
        assert_eq!(account.as_uuid().get_version_num(), 4);
        let parsed = AccountUuid::parse_str(&account.to_string()).unwrap();
        assert_eq!(parsed, account);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Owner {
        #[serde(default, deserialize_with = "deserialize_optional")]
        host: Option<HostUuid>,
    }

    #[test]
    fn test_optional_uuid_treats_empty_as_absent() {
        let empty: Owner = serde_json::from_str(r#"{"host": ""}"#).unwrap();
        assert!(empty.host.is_none());
        let null: Owner = serde_json::from_str(r#"{"host": null}"#).unwrap();
        assert!(null.host.is_none());
        let missing: Owner = serde_json::from_str("{}").unwrap();
        assert!(missing.host.is_none());

        let set: Owner = serde_json::from_str(&format!(r#"{{"host": "{SIMPLE_UUID}"}}"#)).unwrap();
        assert_eq!(set.host.map(|host| host.to_string()).as_deref(), Some(SIMPLE_UUID));

        assert!(serde_json::from_str::<Owner>(r#"{"host": "zzz"}"#).is_err());
    }

    #[test]
    fn test_uuid_conversions() {
        let raw = Uuid::parse_str(SIMPLE_UUID).unwrap();
        let volume: VolumeUuid = raw.into();
        let back: Uuid = volume.into();
        assert_eq!(back, raw);
        assert_eq!(VolumeUuid::new(raw), volume);
    }
}
