//! App record: an installed web application belonging to one user.

use serde_json::Value;

use super::identity::origin_to_id;
use super::record::{Fields, Record, RecordError, Slot, ValidationError, MODIFIED_AT};

const ORIGIN: &str = "origin";
const MANIFEST_PATH: &str = "manifestPath";
const INSTALL_ORIGIN: &str = "installOrigin";
const INSTALLED_AT: &str = "installedAt";
const NAME: &str = "name";
const DELETED: &str = "deleted";
const RECEIPTS: &str = "receipts";

/// An installed app, keyed by the hash of its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct AppRecord {
    pub origin: Slot<String>,
    pub manifest_path: Slot<String>,
    pub install_origin: Slot<String>,
    pub installed_at: Slot<i64>,
    pub modified_at: Slot<i64>,
    pub name: Slot<String>,
    /// Client-side tombstone marker, passed through untouched.
    pub deleted: Slot<bool>,
    pub receipts: Slot<Vec<String>>,
    /// Tolerated fields outside the declared set.
    pub extra: Fields,
}

impl Record for AppRecord {
    const KIND: &'static str = "AppRecord";
    const FIELDS: &'static [&'static str] = &[
        ORIGIN,
        MANIFEST_PATH,
        INSTALL_ORIGIN,
        INSTALLED_AT,
        MODIFIED_AT,
        NAME,
        DELETED,
        RECEIPTS,
    ];

    fn from_fields(mut fields: Fields, extra: Fields) -> Self {
        Self {
            origin: Slot::take(&mut fields, ORIGIN),
            manifest_path: Slot::take(&mut fields, MANIFEST_PATH),
            install_origin: Slot::take(&mut fields, INSTALL_ORIGIN),
            installed_at: Slot::take(&mut fields, INSTALLED_AT),
            modified_at: Slot::take(&mut fields, MODIFIED_AT),
            name: Slot::take(&mut fields, NAME),
            deleted: Slot::take(&mut fields, DELETED),
            receipts: Slot::take(&mut fields, RECEIPTS),
            extra,
        }
    }

    fn id(&self) -> Result<String, RecordError> {
        self.origin
            .valid()
            .map(|origin| origin_to_id(origin))
            .ok_or(RecordError::MissingIdentity {
                kind: Self::KIND,
                field: ORIGIN,
            })
    }

    fn created_at(&self) -> &Slot<i64> {
        &self.installed_at
    }

    fn timestamps_mut(&mut self) -> (&mut Slot<i64>, &mut Slot<i64>) {
        (&mut self.installed_at, &mut self.modified_at)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, slot) in [
            (ORIGIN, &self.origin),
            (MANIFEST_PATH, &self.manifest_path),
            (INSTALL_ORIGIN, &self.install_origin),
        ] {
            slot.require(field, &format!("{} must be a string", field))?;
        }

        if let Slot::Mistyped(_) = self.name {
            return Err(ValidationError::new("name must be a string"));
        }

        for (field, slot) in [
            (INSTALLED_AT, &self.installed_at),
            (MODIFIED_AT, &self.modified_at),
        ] {
            slot.require(field, &format!("{} must be an integer", field))?;
        }

        match &self.receipts {
            Slot::Valid(_) => {}
            Slot::Missing => return Err(ValidationError::missing(RECEIPTS)),
            Slot::Mistyped(Value::Array(_)) => {
                return Err(ValidationError::new("receipts must be a list of strings"))
            }
            Slot::Mistyped(_) => return Err(ValidationError::new("receipts must be a list")),
        }

        match self.deleted {
            Slot::Missing | Slot::Valid(true) => Ok(()),
            _ => Err(ValidationError::new("deleted must be boolean true")),
        }
    }

    fn abbreviate(&self) -> Fields {
        let mut out = Fields::new();
        self.origin.emit(ORIGIN, &mut out);
        self.modified_at.emit(MODIFIED_AT, &mut out);
        out
    }

    fn to_json(&self) -> Fields {
        let mut out = Fields::new();
        self.origin.emit(ORIGIN, &mut out);
        self.manifest_path.emit(MANIFEST_PATH, &mut out);
        self.install_origin.emit(INSTALL_ORIGIN, &mut out);
        self.installed_at.emit(INSTALLED_AT, &mut out);
        self.modified_at.emit(MODIFIED_AT, &mut out);
        self.name.emit(NAME, &mut out);
        self.deleted.emit(DELETED, &mut out);
        self.receipts.emit(RECEIPTS, &mut out);
        out.extend(self.extra.clone());
        out
    }
}
