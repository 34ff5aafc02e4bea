//! Device record: a device registered by one user.

use once_cell::sync::Lazy;
use regex::Regex;

use super::record::{Fields, Record, RecordError, Slot, ValidationError, MODIFIED_AT};

const UUID: &str = "uuid";
const NAME: &str = "name";
const TYPE: &str = "type";
const LAYOUT: &str = "layout";
const ADDED_AT: &str = "addedAt";
const APPS: &str = "apps";

/// A registered device, keyed by its client-supplied UUID.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub uuid: Slot<String>,
    pub name: Slot<String>,
    pub device_type: Slot<String>,
    pub layout: Slot<String>,
    pub added_at: Slot<i64>,
    pub modified_at: Slot<i64>,
    /// Opaque per-device app data; omitted from listings.
    pub apps: Slot<Fields>,
    pub extra: Fields,
}

impl Record for DeviceRecord {
    const KIND: &'static str = "DeviceRecord";
    const FIELDS: &'static [&'static str] =
        &[UUID, NAME, TYPE, LAYOUT, ADDED_AT, MODIFIED_AT, APPS];

    fn from_fields(mut fields: Fields, extra: Fields) -> Self {
        Self {
            uuid: Slot::take(&mut fields, UUID),
            name: Slot::take(&mut fields, NAME),
            device_type: Slot::take(&mut fields, TYPE),
            layout: Slot::take(&mut fields, LAYOUT),
            added_at: Slot::take(&mut fields, ADDED_AT),
            modified_at: Slot::take(&mut fields, MODIFIED_AT),
            apps: Slot::take(&mut fields, APPS),
            extra,
        }
    }

    fn id(&self) -> Result<String, RecordError> {
        self.uuid.valid().cloned().ok_or(RecordError::MissingIdentity {
            kind: Self::KIND,
            field: UUID,
        })
    }

    fn created_at(&self) -> &Slot<i64> {
        &self.added_at
    }

    fn timestamps_mut(&mut self) -> (&mut Slot<i64>, &mut Slot<i64>) {
        (&mut self.added_at, &mut self.modified_at)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, slot) in [
            (NAME, &self.name),
            (TYPE, &self.device_type),
            (LAYOUT, &self.layout),
        ] {
            let value = slot.require(field, &format!("{} must be a string", field))?;
            if value.is_empty() {
                return Err(ValidationError::new(format!(
                    "{} must be a non-empty string",
                    field
                )));
            }
        }

        for (field, slot) in [(ADDED_AT, &self.added_at), (MODIFIED_AT, &self.modified_at)] {
            slot.require(field, &format!("{} must be an integer", field))?;
        }

        let uuid = self.uuid.require(UUID, "uuid must be a valid UUID")?;
        if !is_canonical_uuid(uuid) {
            return Err(ValidationError::new("uuid must be a valid UUID"));
        }

        self.apps.require(APPS, "apps must be a dict")?;
        Ok(())
    }

    fn abbreviate(&self) -> Fields {
        let mut out = self.to_json();
        out.remove(APPS);
        out
    }

    fn to_json(&self) -> Fields {
        let mut out = Fields::new();
        self.uuid.emit(UUID, &mut out);
        self.name.emit(NAME, &mut out);
        self.device_type.emit(TYPE, &mut out);
        self.layout.emit(LAYOUT, &mut out);
        self.added_at.emit(ADDED_AT, &mut out);
        self.modified_at.emit(MODIFIED_AT, &mut out);
        self.apps.emit(APPS, &mut out);
        out.extend(self.extra.clone());
        out
    }
}

/// Uppercase `8-4-4-4-12` form; lowercase or unhyphenated ids are rejected.
static CANONICAL_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{8}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{12}$")
        .expect("valid uuid regex")
});

fn is_canonical_uuid(value: &str) -> bool {
    CANONICAL_UUID.is_match(value)
}
