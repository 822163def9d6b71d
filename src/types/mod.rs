//! Type definitions

pub mod bulk_edit;
pub mod export;
pub mod messages;
pub mod operation;
pub mod preview;
pub mod property;
pub mod row;
pub mod schema;

pub use bulk_edit::*;
pub use export::*;
pub use messages::*;
pub use operation::*;
pub use preview::*;
pub use property::*;
pub use row::*;
pub use schema::*;
