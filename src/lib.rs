//! Client library for a mini-program cloud runtime: a query/update expression
//! builder, a database facade producing request descriptors, and the function
//! and storage calls of the cloud gateway.
//!
//! ```
//! use cloudlite::command::{Command, ExpressionNode, LogicOp};
//!
//! let cmd = Command;
//! let working_age = cmd.gte(18).and(cmd.lt(65)).bind("age").unwrap();
//! let ExpressionNode::Logic(l) = working_age else { panic!("expected a logic node") };
//! assert_eq!(l.operator(), LogicOp::And);
//! assert_eq!(l.operands().len(), 2);
//! ```

pub mod cloud;
pub mod command;
pub mod config;
pub mod database;
pub mod errors;
pub mod geo;
pub mod logger;
pub mod request;
pub mod transport;
pub mod utils;
pub mod values;

pub use cloud::{CallFunctionParams, Cloud, DownloadFileParams, FileListParams, UploadFileParams};
pub use command::Command;
pub use config::{CloudConfig, InitCloudConfig};
pub use database::{CollectionReference, Database, DocumentReference, Query};
pub use errors::{ApiError, CloudError};
pub use transport::{ApiCall, Callbacks, Completion, RecordingTransport, Transport};

/// Initialize logging from `CLOUDLITE_LOG_*` environment variables.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::configure_from_env()
}
