mod event;
mod policy;

pub use {
    event::{ViolationEvent, ViolationKind},
    policy::{Severity, ViolationPolicy},
};
