//! Record models for the AITC apps and devices collections.
//!
//! Each collection maps to one record type; `AnyRecord` dispatches the
//! shared record operations over the closed set of variants.

mod app;
mod device;
pub mod identity;
mod record;

pub use app::*;
pub use device::*;
pub use record::*;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Names of the collections exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Apps,
    Devices,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Apps => "apps",
            CollectionKind::Devices => "devices",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection name outside the declared set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown collection '{0}'")]
pub struct UnknownCollection(pub String);

impl FromStr for CollectionKind {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apps" => Ok(CollectionKind::Apps),
            "devices" => Ok(CollectionKind::Devices),
            other => Err(UnknownCollection(other.to_string())),
        }
    }
}

/// A record of whichever type its collection holds.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRecord {
    App(AppRecord),
    Device(DeviceRecord),
}

impl AnyRecord {
    /// Construct the record type for `kind` from untyped data.
    pub fn from_json(
        kind: CollectionKind,
        data: Value,
        options: RecordOptions,
    ) -> Result<Self, RecordError> {
        match kind {
            CollectionKind::Apps => AppRecord::from_json(data, options).map(AnyRecord::App),
            CollectionKind::Devices => {
                DeviceRecord::from_json(data, options).map(AnyRecord::Device)
            }
        }
    }

    pub fn id(&self) -> Result<String, RecordError> {
        match self {
            AnyRecord::App(app) => app.id(),
            AnyRecord::Device(device) => device.id(),
        }
    }

    /// Fill timestamps from the server clock and the stored predecessor.
    /// A predecessor of a different record type is ignored.
    pub fn populate(&mut self, server_time: i64, previous: Option<&AnyRecord>) {
        match (self, previous) {
            (AnyRecord::App(app), Some(AnyRecord::App(prev))) => app.populate(server_time, Some(prev)),
            (AnyRecord::App(app), _) => app.populate(server_time, None),
            (AnyRecord::Device(device), Some(AnyRecord::Device(prev))) => {
                device.populate(server_time, Some(prev))
            }
            (AnyRecord::Device(device), _) => device.populate(server_time, None),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            AnyRecord::App(app) => app.validate(),
            AnyRecord::Device(device) => device.validate(),
        }
    }

    pub fn abbreviate(&self) -> Fields {
        match self {
            AnyRecord::App(app) => app.abbreviate(),
            AnyRecord::Device(device) => device.abbreviate(),
        }
    }

    pub fn to_json(&self) -> Fields {
        match self {
            AnyRecord::App(app) => app.to_json(),
            AnyRecord::Device(device) => device.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_names() {
        assert_eq!("apps".parse::<CollectionKind>(), Ok(CollectionKind::Apps));
        assert_eq!("devices".parse::<CollectionKind>(), Ok(CollectionKind::Devices));
        assert_eq!(
            "oops".parse::<CollectionKind>(),
            Err(UnknownCollection("oops".to_string()))
        );
        assert!("Apps".parse::<CollectionKind>().is_err());
        assert_eq!(CollectionKind::Devices.to_string(), "devices");
    }

    #[test]
    fn test_dispatch_by_collection() {
        let record = AnyRecord::from_json(
            CollectionKind::Devices,
            json!({"uuid": "75B538D8-67AF-44E8-86A0-B1A07BE137C8"}),
            RecordOptions::default(),
        )
        .unwrap();
        assert!(matches!(record, AnyRecord::Device(_)));
        assert_eq!(record.id().unwrap(), "75B538D8-67AF-44E8-86A0-B1A07BE137C8");

        // Device fields are unknown to apps.
        assert!(AnyRecord::from_json(
            CollectionKind::Apps,
            json!({"uuid": "75B538D8-67AF-44E8-86A0-B1A07BE137C8"}),
            RecordOptions::default(),
        )
        .is_err());
    }

    #[test]
    fn test_populate_ignores_mismatched_predecessor() {
        let previous = AnyRecord::from_json(
            CollectionKind::Devices,
            json!({"addedAt": 1}),
            RecordOptions::default(),
        )
        .unwrap();
        let mut record =
            AnyRecord::from_json(CollectionKind::Apps, json!({}), RecordOptions::default())
                .unwrap();
        record.populate(50, Some(&previous));
        assert_eq!(record.to_json()["installedAt"], json!(50));
        assert_eq!(record.to_json()["modifiedAt"], json!(50));
    }
}
