use std::cell::Cell;
use uuid::Uuid;

/// Prefix of package, section, group and division identifiers
pub const PACKAGE_ID_PREFIX: &str = "uuid-";

/// Prefix of `file` identifiers
pub const FILE_ID_PREFIX: &str = "ID-";

/// Source of fresh identifiers for rewritten manifests
///
/// No collision detection is done: uniqueness relies on the UUIDs returned by
/// [`IdGenerator::next_uuid()`].
pub trait IdGenerator {
    fn next_uuid(&self) -> Uuid;

    /// `uuid-<uuid>`
    fn new_package_id(&self) -> String {
        format!("{PACKAGE_ID_PREFIX}{}", self.next_uuid())
    }

    /// `ID-<uuid>`
    fn new_file_id(&self) -> String {
        format!("{FILE_ID_PREFIX}{}", self.next_uuid())
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// Random version 4 UUIDs
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[derive(Debug, Default)]
/// Predictable identifiers: `Uuid::from_u128(1)`, `Uuid::from_u128(2)`, ...
pub struct SequentialIds(Cell<u128>);

impl IdGenerator for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let next = self.0.get() + 1;
        self.0.set(next);
        Uuid::from_u128(next)
    }
}
