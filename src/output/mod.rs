//! JSON output for CLI commands
//!
//! Every command wraps its payload in a schema-versioned [`JsonResponse`].

pub mod command;

pub use command::{
    generate_execution_id, output_json, CheckResponse, ErrorResponse, GraphResponse, JsonResponse,
    OutputFormat, RestoreResponse, SliceEntry, SliceResponse,
};
