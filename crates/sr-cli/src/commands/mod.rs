pub mod audits;
pub mod recover;
pub mod register;
pub mod view;

use serde_json::{Value, json};
use sr_registrar::RegistrarError;

pub(crate) fn error_json(err: &RegistrarError) -> Value {
    json!({ "kind": err.kind(), "error": err.to_string() })
}
