use std::{fmt::Display, str::FromStr};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Representation directories are not named `<prefix>1`, `<prefix>2`, ...
pub enum SequenceError {
    /// Name does not end with a number
    #[error("Representation `{0}` has no sequence number")]
    MissingNumber(String),
    /// Names do not share the same prefix
    #[error("Representation naming mismatch: expected prefix `{expected}`, got `{found}`")]
    PrefixMismatch { expected: String, found: String },
    /// Numbers do not go 1, 2, 3, ...
    #[error("Representation number sequence broken: expected {expected}, got {found}")]
    Gap { expected: u32, found: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
/// Representation directory name split into its prefix and trailing number
pub struct RepresentationName {
    prefix: String,
    number: u32,
}

impl RepresentationName {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl FromStr for RepresentationName {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = s.trim_end_matches(|c: char| c.is_ascii_digit());
        let number = s[prefix.len()..]
            .parse()
            .map_err(|_| SequenceError::MissingNumber(s.to_string()))?;

        Ok(Self {
            prefix: prefix.to_string(),
            number,
        })
    }
}

impl Display for RepresentationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

/// Check that representation directory names share one prefix and are numbered from 1 without gaps
///
/// Names may be given in any order. On success they are returned sorted by number.
///
/// # Examples
///
/// ```
/// use eark_aip::{validate_sequence, error::SequenceError};
///
/// assert!(validate_sequence(&["img1", "img2", "img3"]).is_ok());
/// assert_eq!(
///     validate_sequence(&["img1", "img3"]),
///     Err(SequenceError::Gap { expected: 2, found: 3 })
/// );
/// ```
pub fn validate_sequence<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<RepresentationName>, SequenceError> {
    let mut parsed = names
        .iter()
        .map(|name| RepresentationName::from_str(name.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort();

    if let Some((first, rest)) = parsed.split_first() {
        if let Some(other) = rest.iter().find(|name| name.prefix != first.prefix) {
            return Err(SequenceError::PrefixMismatch {
                expected: first.prefix.clone(),
                found: other.prefix.clone(),
            });
        }
    }

    for (expected, name) in (1..).zip(parsed.iter()) {
        if name.number != expected {
            return Err(SequenceError::Gap {
                expected,
                found: name.number,
            });
        }
    }

    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NamePart {
    Number(u64),
    Text(String),
}

/// Sort key comparing runs of digits by value: `rep2.1` comes before `rep10.1`
pub(crate) fn natural_key(name: &str) -> Vec<NamePart> {
    let mut parts = Vec::new();
    let mut rest = name;
    while let Some(first) = rest.chars().next() {
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        parts.push(match run.parse() {
            Ok(number) if digits => NamePart::Number(number),
            _ => NamePart::Text(run.to_string()),
        });
        rest = tail;
    }
    parts
}
