use digest::Digest;
use std::fmt::Display;

#[derive(Debug, PartialEq)]
/// Checksum algorithms understood by the METS `CHECKSUMTYPE` attribute
///
/// Taken from the enumeration in <https://www.loc.gov/standards/mets/mets.xsd>
pub enum Algorithm {
    Sha256,
    Sha512,
    Sha1,
    Md5,
    Custom(&'static str),
}

impl Algorithm {
    /// Value written in `CHECKSUMTYPE`
    pub fn name(&self) -> &str {
        match self {
            Algorithm::Sha256 => "SHA-256",
            Algorithm::Sha512 => "SHA-512",
            Algorithm::Sha1 => "SHA-1",
            Algorithm::Md5 => "MD5",
            Algorithm::Custom(x) => x,
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, PartialEq)]
/// Binds a METS checksum type name to the [`Digest`] implementation computing it
pub struct ChecksumAlgorithm<ChecksumAlgo: Digest> {
    inner: Algorithm,
    marker: std::marker::PhantomData<ChecksumAlgo>,
}

impl<ChecksumAlgo: Digest> ChecksumAlgorithm<ChecksumAlgo> {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            inner: algorithm,
            marker: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.inner
    }
}
