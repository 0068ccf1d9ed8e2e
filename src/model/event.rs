//! Event data model.
use std::collections::HashMap;

use super::{EventKey, EventMetric, PropertyValue};

/// One tracked behavioral event: a metric name plus an open property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    metric: EventMetric,
    properties: HashMap<EventKey, PropertyValue>,
}

impl Event {
    /// Create an event for the given metric.
    pub fn new(metric: impl Into<EventMetric>) -> Event {
        Event {
            metric: metric.into(),
            properties: HashMap::new(),
        }
    }

    /// The event's metric.
    pub fn metric(&self) -> &EventMetric {
        &self.metric
    }

    /// Look up a property.
    pub fn get(&self, key: &EventKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Set a property. Custom properties can use any key name that isn't already reserved.
    pub fn set(&mut self, key: EventKey, value: impl Into<PropertyValue>) -> &mut Event {
        self.properties.insert(key, value.into());
        self
    }

    /// The backing property map.
    pub fn properties(&self) -> &HashMap<EventKey, PropertyValue> {
        &self.properties
    }

    /// Numeric value of the event, e.g. an order total.
    pub fn value(&self) -> Option<f64> {
        self.get(&EventKey::Value).and_then(PropertyValue::as_number)
    }

    /// Set the numeric value of the event.
    pub fn set_value(&mut self, value: f64) -> &mut Event {
        self.set(EventKey::Value, value)
    }

    /// Client-generated unique id, used for server-side deduplication.
    pub fn unique_id(&self) -> Option<&str> {
        self.get(&EventKey::EventId).and_then(PropertyValue::as_str)
    }

    /// Set the unique id.
    pub fn set_unique_id(&mut self, unique_id: impl Into<String>) -> &mut Event {
        self.set(EventKey::EventId, unique_id.into())
    }
}
