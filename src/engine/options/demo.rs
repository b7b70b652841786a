//! engine::options::demo
//!
//! Demo period expiry marker. Never changed by alterations unless the
//! caller supplies a new value.

use serde::Deserialize;
use serde_json::Value;

use super::{decode_fields, Facet, FacetData, FacetError, PlanOption};
use crate::core::types::{FacetKey, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DemoWindow {
    active_until: Timestamp,
}

#[derive(Deserialize)]
struct RawDemoWindow {
    active_till: Timestamp,
}

impl DemoWindow {
    pub fn new(active_until: Timestamp) -> Self {
        Self { active_until }
    }

    pub(crate) fn decode(data: &FacetData) -> Result<Self, FacetError> {
        let raw: RawDemoWindow = decode_fields(FacetKey::Demo, data)?;
        Ok(Self::new(raw.active_till))
    }

    /// Demo expiry.
    pub fn active_until(&self) -> Timestamp {
        self.active_until
    }
}

impl Facet for DemoWindow {
    const KEY: FacetKey = FacetKey::Demo;

    fn project(option: &PlanOption) -> Option<&Self> {
        match option {
            PlanOption::Demo(demo) => Some(demo),
            _ => None,
        }
    }

    fn export(&self) -> FacetData {
        let mut data = FacetData::new();
        data.insert("active_till".to_string(), Value::from(self.active_until));
        data
    }
}
