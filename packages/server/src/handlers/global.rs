//! The global operations, valid at any address.

use std::sync::Arc;

use bosun_core::{KindError, ModelValue, ValueKind, ValueMap};

use crate::pipeline::{HandlerRegistry, OperationContext, OperationError, StepHandler};
use crate::tree::Resource;

use super::{flag, require_str};

pub const READ_RESOURCE: &str = "read-resource";
pub const READ_ATTRIBUTE: &str = "read-attribute";
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const READ_OPERATION_NAMES: &str = "read-operation-names";
pub const READ_OPERATION_DESCRIPTION: &str = "read-operation-description";

/// Registers the global operations.
pub fn register(registry: &HandlerRegistry) {
    registry.register(READ_RESOURCE, Arc::new(ReadResourceHandler));
    registry.register(READ_ATTRIBUTE, Arc::new(ReadAttributeHandler));
    registry.register(WRITE_ATTRIBUTE, Arc::new(WriteAttributeHandler));
    registry.register(ADD, Arc::new(AddResourceHandler));
    registry.register(REMOVE, Arc::new(RemoveResourceHandler));
    registry.register(READ_OPERATION_NAMES, Arc::new(ReadOperationNamesHandler));
    registry.register(
        READ_OPERATION_DESCRIPTION,
        Arc::new(ReadOperationDescriptionHandler),
    );
}

/// Builds the descriptive metadata object the introspection operations
/// serve for a built-in handler.
fn describe(operation: &str, summary: &str, params: &[(&str, &str, &str)]) -> ModelValue {
    let mut description = ValueMap::new();
    description.insert("operation-name", operation);
    description.insert("description", summary);
    let mut properties = ValueMap::new();
    for (name, kind, text) in params {
        let mut property = ValueMap::new();
        property.insert("type", *kind);
        property.insert("description", *text);
        properties.insert(*name, ModelValue::Object(property));
    }
    description.insert("request-properties", ModelValue::Object(properties));
    ModelValue::Object(description)
}

/// Renders a resource as a model value: its attributes, and with
/// `recursive` its children nested two levels deep as
/// `type -> instance -> value`.
fn resource_value(resource: &Resource, recursive: bool) -> Result<ModelValue, KindError> {
    let mut value = resource.model().clone();
    if recursive && resource.has_children() {
        if !value.is_defined() {
            value = ModelValue::object();
        }
        let found = value.kind();
        let ModelValue::Object(map) = &mut value else {
            return Err(KindError {
                expected: ValueKind::Object,
                found,
            });
        };
        for (element, child) in resource.children() {
            let rendered = resource_value(child, true)?;
            map.entry(element.key()).set(element.value(), rendered)?;
        }
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// read-resource
// ---------------------------------------------------------------------------

/// Reads the target resource's attributes. With `recursive`, children are
/// nested into the result; a wildcard address expands into a list of
/// `{address, result}` entries in structural order.
pub struct ReadResourceHandler;

impl StepHandler for ReadResourceHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let recursive = flag(operation, "recursive");
        let address = context.current_address().clone();

        if address.is_multi_target() {
            let mut entries = Vec::new();
            for (found, resource) in context.query(&address) {
                let mut entry = ValueMap::new();
                entry.insert("address", found.to_string());
                entry.insert("result", resource_value(resource, recursive)?);
                entries.push(ModelValue::Object(entry));
            }
            context.set_result(ModelValue::List(entries));
        } else {
            let resource = context.resource(&address)?;
            let rendered = resource_value(resource, recursive)?;
            context.set_result(rendered);
        }
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            READ_RESOURCE,
            "Reads a resource's attributes, optionally recursing into its children.",
            &[(
                "recursive",
                "boolean",
                "Nest child resources into the result.",
            )],
        )
    }
}

// ---------------------------------------------------------------------------
// read-attribute / write-attribute
// ---------------------------------------------------------------------------

/// Reads one attribute of the target resource. An absent attribute reads
/// as undefined.
pub struct ReadAttributeHandler;

impl StepHandler for ReadAttributeHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let name = require_str(operation, "name")?.to_string();
        let address = context.current_address().clone();
        let value = context
            .read_model(&address)?
            .get(&name)
            .cloned()
            .unwrap_or_default();
        context.set_result(value);
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            READ_ATTRIBUTE,
            "Reads one attribute; absent attributes read as undefined.",
            &[("name", "string", "The attribute to read.")],
        )
    }
}

/// Sets one attribute of the target resource. Writing undefined is how an
/// attribute is unset.
pub struct WriteAttributeHandler;

impl StepHandler for WriteAttributeHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let name = require_str(operation, "name")?.to_string();
        let value = operation.get("value").cloned().unwrap_or_default();
        let address = context.current_address().clone();
        context.read_model_for_update(&address)?.set(name, value)?;
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            WRITE_ATTRIBUTE,
            "Sets one attribute of the target resource.",
            &[
                ("name", "string", "The attribute to set."),
                ("value", "any", "The new value; undefined unsets."),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// add / remove
// ---------------------------------------------------------------------------

/// Creates the target resource with the operation parameters as its
/// initial attributes.
pub struct AddResourceHandler;

impl StepHandler for AddResourceHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let address = context.current_address().clone();
        context.create_resource(&address, operation.clone())?;
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            ADD,
            "Creates the target resource; the parameters become its attributes.",
            &[],
        )
    }
}

/// Removes the target resource. Without `recursive` a populated resource
/// is refused.
pub struct RemoveResourceHandler;

impl StepHandler for RemoveResourceHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let recursive = flag(operation, "recursive");
        let address = context.current_address().clone();
        context.remove_resource(&address, recursive)?;
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            REMOVE,
            "Removes the target resource.",
            &[(
                "recursive",
                "boolean",
                "Remove the whole subtree beneath it as well.",
            )],
        )
    }
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// Lists every registered operation name, sorted.
pub struct ReadOperationNamesHandler;

impl StepHandler for ReadOperationNamesHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        _operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let names: Vec<ModelValue> = context
            .registry()
            .names()
            .into_iter()
            .map(ModelValue::from)
            .collect();
        context.set_result(ModelValue::List(names));
        Ok(())
    }

    fn description(&self) -> ModelValue {
        describe(
            READ_OPERATION_NAMES,
            "Lists the names of every registered operation.",
            &[],
        )
    }
}

/// Serves the descriptive metadata of one registered operation.
pub struct ReadOperationDescriptionHandler;

impl StepHandler for ReadOperationDescriptionHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        let name = require_str(operation, "name")?.to_string();
        match context.registry().description(&name) {
            Some(description) => {
                context.set_result(description);
                Ok(())
            }
            None => Err(OperationError::UnknownOperation {
                name,
                address: context.current_address().clone(),
            }),
        }
    }

    fn description(&self) -> ModelValue {
        describe(
            READ_OPERATION_DESCRIPTION,
            "Serves the descriptive metadata of one registered operation.",
            &[("name", "string", "The operation to describe.")],
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
