use crate::identifier::PACKAGE_ID_PREFIX;
use std::{fmt::Display, str::FromStr};
use uuid::{Uuid, Version};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Package directory name does not end with a well-formed random UUID
pub enum InvalidPackageNameError {
    /// No `uuid-` marker in the name
    #[error("Package name `{0}` does not contain `uuid-`")]
    MissingUuid(String),
    /// Text after the marker is not a hyphenated UUID
    #[error("`{0}` is not a hyphenated UUID")]
    MalformedUuid(String),
    /// UUID parsed but is not a version 4 (random) UUID
    #[error("`{0}` is not a random (version 4) UUID")]
    NotRandomUuid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Directory name of an information package: `<prefix>uuid-<uuid4>`
///
/// The prefix is free text and may be empty, e.g. `my-package-uuid-...` or `uuid-...`.
pub struct PackageName {
    prefix: String,
    uuid: Uuid,
}

impl PackageName {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Same prefix, different UUID
    pub fn with_uuid(&self, uuid: Uuid) -> Self {
        Self {
            prefix: self.prefix.clone(),
            uuid,
        }
    }
}

impl FromStr for PackageName {
    type Err = InvalidPackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let marker = s
            .rfind(PACKAGE_ID_PREFIX)
            .ok_or_else(|| InvalidPackageNameError::MissingUuid(s.to_string()))?;
        let (prefix, suffix) = s.split_at(marker);
        let suffix = &suffix[PACKAGE_ID_PREFIX.len()..];

        let uuid = Uuid::try_parse(suffix)
            .map_err(|_| InvalidPackageNameError::MalformedUuid(suffix.to_string()))?;

        // `try_parse` also accepts the simple, braced and urn forms
        if !uuid
            .hyphenated()
            .to_string()
            .eq_ignore_ascii_case(suffix)
        {
            return Err(InvalidPackageNameError::MalformedUuid(suffix.to_string()));
        }

        if uuid.get_version() != Some(Version::Random) {
            return Err(InvalidPackageNameError::NotRandomUuid(suffix.to_string()));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            uuid,
        })
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{PACKAGE_ID_PREFIX}{}", self.prefix, self.uuid)
    }
}
