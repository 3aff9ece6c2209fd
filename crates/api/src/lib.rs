//! HTTP control surface for the notification dispatcher.
//!
//! - POST /api/upload_csv: Upload a recipient list (schema-checked)
//! - GET  /api/config: Current settings and templates
//! - POST /api/save_templates: Save templates and settings
//! - POST /api/start_messaging: Start a dispatch run on the latest upload
//! - GET  /api/status: Poll run progress

pub mod routes;
pub mod state;
