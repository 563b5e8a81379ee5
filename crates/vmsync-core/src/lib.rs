//! Core domain model for vehicle make synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "vmsync-core";

/// A vehicle category owned by exactly one [`Make`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleType {
    pub type_id: String,
    pub type_name: String,
}

impl VehicleType {
    pub fn new(type_id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            type_name: type_name.into(),
        }
    }
}

/// Top-level manufacturer record, keyed by the upstream `make_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Make {
    pub make_id: String,
    pub make_name: String,
    #[serde(default)]
    pub vehicle_types: Vec<VehicleType>,
}

impl Make {
    /// A make with no types yet, as first observed in the all-makes feed.
    pub fn shell(make_id: impl Into<String>, make_name: impl Into<String>) -> Self {
        Self {
            make_id: make_id.into(),
            make_name: make_name.into(),
            vehicle_types: Vec::new(),
        }
    }

    pub fn with_types(mut self, vehicle_types: Vec<VehicleType>) -> Self {
        self.vehicle_types = vehicle_types;
        self
    }

    /// Type lists compare as sets; ordering is kept only for display.
    pub fn same_content(&self, other: &Make) -> bool {
        if self.make_id != other.make_id || self.make_name != other.make_name {
            return false;
        }
        let mut a = self.vehicle_types.clone();
        let mut b = other.vehicle_types.clone();
        a.sort_by(|x, y| x.type_id.cmp(&y.type_id));
        b.sort_by(|x, y| x.type_id.cmp(&y.type_id));
        a == b
    }
}

/// Upsert document for a single make.
///
/// `vehicle_types == None` leaves whatever the store holds untouched; on a
/// fresh insert it becomes an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeWrite {
    pub make_id: String,
    pub make_name: String,
    pub vehicle_types: Option<Vec<VehicleType>>,
}

impl MakeWrite {
    pub fn replace(make: Make) -> Self {
        Self {
            make_id: make.make_id,
            make_name: make.make_name,
            vehicle_types: Some(make.vehicle_types),
        }
    }

    pub fn name_only(make: &Make) -> Self {
        Self {
            make_id: make.make_id.clone(),
            make_name: make.make_name.clone(),
            vehicle_types: None,
        }
    }

    pub fn touches_types(&self) -> bool {
        self.vehicle_types.is_some()
    }

    /// Project this write onto the currently stored record, if any.
    pub fn apply_to(&self, existing: Option<&Make>) -> Make {
        let vehicle_types = match (&self.vehicle_types, existing) {
            (Some(types), _) => types.clone(),
            (None, Some(stored)) => stored.vehicle_types.clone(),
            (None, None) => Vec::new(),
        };
        Make {
            make_id: self.make_id.clone(),
            make_name: self.make_name.clone(),
            vehicle_types,
        }
    }
}

/// Undecoded response body from the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub url: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}
