//! Bulk pipeline services

pub mod bulk;
pub mod bulk_edit;
pub mod cancellation;
pub mod export_serializer;
pub mod history;
pub mod import_executor;
pub mod preview;
pub mod record_store;
pub mod registry;
pub mod template;
pub mod tracker;
pub mod upload;
pub mod validator;
