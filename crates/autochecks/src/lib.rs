//! Autochecks: persistence of automatically discovered services.
//!
//! Every monitored host owns one autochecks file holding the services that
//! discovery accepted into its configuration. The file is a list literal with
//! one record per line:
//!
//! ```text
//! [
//!   ('df', '/boot', {'levels': (80.0, 90.0)}),
//!   ('uptime', None, {}),
//! ]
//! ```
//!
//! ## Core Types
//!
//! - [`Value`] - Restricted literal value (numbers, strings, lists, tuples, dicts, booleans, `None`)
//! - [`ServiceKey`] - A `(check_type, item)` pair identifying one service
//! - [`AutocheckRecord`] - A persisted service with its unevaluated parameter string
//! - [`AutochecksStore`] - Reads, writes and edits the files of a site
//!
//! Parameter strings are carried verbatim. Reading never evaluates them and
//! writing never re-serializes them.

pub mod error;
pub mod literal;
pub mod parser;
pub mod record;
pub mod store;

pub use error::{AutochecksError, Result};
pub use literal::{LiteralError, Value};
pub use record::{AutocheckRecord, ServiceKey};
pub use store::{AutochecksStore, World};
