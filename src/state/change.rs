//! State change notifications.
use std::collections::HashMap;

use crate::model::{Profile, ProfileKey, PropertyValue};

/// One mutation of user state, delivered to observers in occurrence order.
#[derive(Debug, Clone)]
pub enum StateChange {
    /// The public API key (company id) changed.
    ApiKey {
        /// Previous key, if one was set.
        old: Option<String>,
    },
    /// A profile identifier changed, outside of a full reset.
    Identifier {
        /// Which identifier.
        key: ProfileKey,
        /// Previous value.
        old: Option<String>,
    },
    /// The profile attribute bucket changed as a whole.
    Attributes {
        /// Previous contents of the bucket.
        old: HashMap<ProfileKey, PropertyValue>,
    },
    /// The whole profile was reset.
    Reset {
        /// The profile as it was before the reset.
        old: Profile,
    },
    /// Catch-all change to a single keyed value (push token, push state, ...).
    KeyValue {
        /// Which key.
        key: ProfileKey,
        /// Previous value.
        old: Option<String>,
    },
}
