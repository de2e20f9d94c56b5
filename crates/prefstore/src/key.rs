//! Typed keys for preference storage.

use std::{borrow::Cow, fmt};

use crate::ValidationError;

/// The scalar types a preference can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// UTF-8 text
    String,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// `true` or `false`
    Boolean,
}

impl ScalarType {
    /// The tag persisted next to plaintext values of this type.
    pub const fn tag(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a persisted entry holds, as recorded by its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A plaintext value of the given type
    Plain(ScalarType),
    /// An encrypted envelope wrapping a string
    Encrypted,
}

const ENCRYPTED_TAG: &str = "encrypted";

impl EntryKind {
    /// The tag persisted for this kind of entry.
    pub const fn tag(self) -> &'static str {
        match self {
            EntryKind::Plain(scalar_type) => scalar_type.tag(),
            EntryKind::Encrypted => ENCRYPTED_TAG,
        }
    }

    /// Parse a persisted tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "string" => EntryKind::Plain(ScalarType::String),
            "int" => EntryKind::Plain(ScalarType::Int),
            "long" => EntryKind::Plain(ScalarType::Long),
            "float" => EntryKind::Plain(ScalarType::Float),
            "double" => EntryKind::Plain(ScalarType::Double),
            "boolean" => EntryKind::Plain(ScalarType::Boolean),
            ENCRYPTED_TAG => EntryKind::Encrypted,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identifies a preference by name and declares the type of its value.
///
/// Keys are plain values and can be declared as constants:
///
/// ```rust
/// use prefstore::{ScalarType, TypedKey};
///
/// const VOLUME: TypedKey = TypedKey::int("volume");
/// assert_eq!(VOLUME.scalar_type(), ScalarType::Int);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedKey {
    name: Cow<'static, str>,
    scalar_type: ScalarType,
}

impl TypedKey {
    /// Create a key with a static name.
    pub const fn new(name: &'static str, scalar_type: ScalarType) -> Self {
        Self {
            name: Cow::Borrowed(name),
            scalar_type,
        }
    }

    /// Create a key with a name built at runtime.
    pub fn named(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            scalar_type,
        }
    }

    #[allow(missing_docs)]
    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ScalarType::String)
    }

    #[allow(missing_docs)]
    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ScalarType::Int)
    }

    #[allow(missing_docs)]
    pub const fn long(name: &'static str) -> Self {
        Self::new(name, ScalarType::Long)
    }

    #[allow(missing_docs)]
    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ScalarType::Float)
    }

    #[allow(missing_docs)]
    pub const fn double(name: &'static str) -> Self {
        Self::new(name, ScalarType::Double)
    }

    #[allow(missing_docs)]
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ScalarType::Boolean)
    }

    /// The name the value is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared value type.
    pub const fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }
}

/// A key restricted to string values. Only these keys can be used with encrypted storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringKey(TypedKey);

impl StringKey {
    /// Create a string key with a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(TypedKey::string(name))
    }

    /// Create a string key with a name built at runtime.
    pub fn named(name: impl Into<String>) -> Self {
        Self(TypedKey::named(name, ScalarType::String))
    }

    /// The name the value is stored under.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// View this key as a [TypedKey], for example to remove the value.
    pub const fn as_typed(&self) -> &TypedKey {
        &self.0
    }
}

impl From<StringKey> for TypedKey {
    fn from(key: StringKey) -> Self {
        key.0
    }
}

impl TryFrom<TypedKey> for StringKey {
    type Error = ValidationError;

    fn try_from(key: TypedKey) -> Result<Self, Self::Error> {
        match key.scalar_type {
            ScalarType::String => Ok(Self(key)),
            other => Err(ValidationError::new(
                key.name(),
                EntryKind::Plain(ScalarType::String),
                EntryKind::Plain(other),
            )),
        }
    }
}
