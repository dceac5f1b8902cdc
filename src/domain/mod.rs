//! Domain layer for ua-batch-publisher.
//!
//! Contains the canonical types shared across all modules:
//! - `NotificationRecord`: a data change or an event, as produced upstream
//! - `NotificationHeader`: the identity fields common to both cases

pub mod notification;

pub use notification::{
    DataChange, EncodingContext, EventField, NotificationHeader, NotificationRecord,
};
