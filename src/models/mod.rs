// Models module - Database entity representations

pub mod property;
pub mod unit;
pub mod visitor_event;
pub mod visitor_pass;

pub use property::Property;
pub use unit::Unit;
pub use visitor_event::{ValidationResult, VisitorEvent};
pub use visitor_pass::{EffectiveStatus, PassStatus, VisitorPass};
