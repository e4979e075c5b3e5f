//! Built-in operation handlers.
//!
//! The global operations work at any address; host registration is a
//! boot-only special case. Everything else a deployment needs is expected
//! to arrive through [`HandlerRegistry::register`](crate::pipeline::HandlerRegistry::register).

use std::sync::Arc;

use bosun_core::ModelValue;

use crate::pipeline::{ManagementController, OperationError};

pub mod global;
pub mod host;

pub use global::{
    ADD, READ_ATTRIBUTE, READ_OPERATION_DESCRIPTION, READ_OPERATION_NAMES, READ_RESOURCE,
    REMOVE, WRITE_ATTRIBUTE,
};
pub use host::{AddHostHandler, ADD_HOST};

/// Registers every built-in operation on the controller's registry.
pub fn register_builtin(controller: &ManagementController) {
    let registry = controller.registry();
    registry.register(
        host::ADD_HOST,
        Arc::new(AddHostHandler::new(controller.host_info_slot())),
    );
    global::register(registry);
}

/// Looks up a required string parameter.
pub(crate) fn require_str<'v>(
    params: &'v ModelValue,
    name: &str,
) -> Result<&'v str, OperationError> {
    params
        .get(name)
        .and_then(ModelValue::as_str)
        .ok_or_else(|| OperationError::MissingParameter(name.to_string()))
}

/// Reads an optional boolean parameter; absent means `false`.
pub(crate) fn flag(params: &ModelValue, name: &str) -> bool {
    params
        .get(name)
        .and_then(ModelValue::as_bool)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_str_accepts_only_defined_strings() {
        let mut params = ModelValue::object();
        params.set("name", "a").unwrap();
        params.set("count", 3_i64).unwrap();

        assert_eq!(require_str(&params, "name").unwrap(), "a");
        assert!(matches!(
            require_str(&params, "count"),
            Err(OperationError::MissingParameter(name)) if name == "count"
        ));
        assert!(require_str(&params, "absent").is_err());
        assert!(require_str(&ModelValue::Undefined, "name").is_err());
    }

    #[test]
    fn flag_defaults_to_false() {
        let mut params = ModelValue::object();
        params.set("recursive", true).unwrap();

        assert!(flag(&params, "recursive"));
        assert!(!flag(&params, "other"));
        assert!(!flag(&ModelValue::Undefined, "recursive"));
    }
}
