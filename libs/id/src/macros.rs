//! Macros for defining typed document IDs.

/// Defines a typed ID bound to a prefix and to the store collection its
/// documents live in.
///
/// The generated newtype wraps a ULID and provides:
/// - `PREFIX` and `COLLECTION` constants
/// - `new()`, `parse()`, `link()` and `from_link()`
/// - `Display`, `FromStr`, `Serialize`, `Deserialize`
///
/// # Example
///
/// ```ignore
/// define_id!(PlacementId, "grp", "/resources/group-placements");
///
/// let id = PlacementId::new();
/// let link = id.link(); // /resources/group-placements/grp_01H...
/// assert_eq!(PlacementId::from_link(&link)?, id);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal, $collection:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::Ulid);

        impl $name {
            /// ID prefix, e.g. `grp`.
            pub const PREFIX: &'static str = $prefix;

            /// Store collection for documents addressed by this ID.
            pub const COLLECTION: &'static str = $collection;

            #[must_use]
            pub fn new() -> Self {
                Self($crate::Ulid::new())
            }

            #[must_use]
            pub const fn from_ulid(ulid: $crate::Ulid) -> Self {
                Self(ulid)
            }

            #[must_use]
            pub const fn ulid(&self) -> $crate::Ulid {
                self.0
            }

            /// Parses `{prefix}_{ulid}`.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let Some((prefix, ulid_str)) = s.split_once('_') else {
                    return Err($crate::IdError::MissingSeparator);
                };

                if prefix != Self::PREFIX {
                    return Err($crate::IdError::InvalidPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                ulid_str
                    .parse::<$crate::Ulid>()
                    .map(Self)
                    .map_err(|e| $crate::IdError::InvalidUlid(e.to_string()))
            }

            /// Link of the document this ID names.
            #[must_use]
            pub fn link(&self) -> $crate::DocumentLink {
                $crate::DocumentLink::new(Self::COLLECTION, &format!("{}", self))
            }

            /// Recovers the ID from a link in this ID's collection.
            pub fn from_link(link: &$crate::DocumentLink) -> Result<Self, $crate::IdError> {
                if link.collection() != Self::COLLECTION {
                    return Err($crate::IdError::WrongCollection {
                        expected: Self::COLLECTION,
                        link: link.to_string(),
                    });
                }
                Self::parse(link.id())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
