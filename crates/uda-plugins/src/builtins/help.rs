//! `HELP`: server liveness and service listing.

use std::time::{SystemTime, UNIX_EPOCH};

use uda_protocol::types::{FieldDescriptor, Primitive, TypeDescriptor, TypeKind, TypeTable};
use uda_protocol::value::AllocationLedger;
use uda_protocol::{ArrayData, Node, Value, ValueError};

use crate::descriptor::PluginDescriptor;
use crate::plugin::{Plugin, PluginCall, PluginFailure, ResultSlot};

const PING_LAYOUT: &str = "ping";
const SERVICE_LAYOUT: &str = "service";

/// Answers `ping()` and `services()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpPlugin;

impl Plugin for HelpPlugin {
    fn invoke(&self, call: &PluginCall, slot: &mut ResultSlot) -> Result<(), PluginFailure> {
        let value = match call.function().to_ascii_lowercase().as_str() {
            "ping" => ping(),
            "services" => services(&call.services),
            other => return Err(PluginFailure::unsupported("HELP", other)),
        };
        slot.set(value.map_err(|error| PluginFailure::failed(error.to_string()))?);
        Ok(())
    }
}

fn ping() -> Result<Value, ValueError> {
    let layout = TypeDescriptor::record(
        PING_LAYOUT,
        vec![
            FieldDescriptor::new("server_version", TypeKind::Text),
            FieldDescriptor::new("timestamp", TypeKind::Atomic(Primitive::UInt64)),
        ],
    );
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());

    let mut ledger = AllocationLedger::new();
    let version = ledger.alloc(Node::string(env!("CARGO_PKG_VERSION")))?;
    let timestamp = ledger.alloc(Node::scalar(ArrayData::UInt64(vec![seconds])))?;
    let root = ledger.alloc(Node::record(PING_LAYOUT, vec![Some(version), Some(timestamp)]))?;
    Ok(Value::new(TypeTable::new().with(layout), ledger, root)?.with_label("HELP::ping"))
}

fn services(descriptors: &[PluginDescriptor]) -> Result<Value, ValueError> {
    let layout = TypeDescriptor::record(
        SERVICE_LAYOUT,
        vec![
            FieldDescriptor::new("name", TypeKind::Text),
            FieldDescriptor::new("class", TypeKind::Text),
            FieldDescriptor::new("description", TypeKind::Text),
        ],
    );
    let mut ledger = AllocationLedger::new();
    let mut entries = Vec::new();
    for descriptor in descriptors.iter().filter(|descriptor| !descriptor.is_private()) {
        let name = ledger.alloc(Node::string(descriptor.name()))?;
        let class = ledger.alloc(Node::string(descriptor.class().as_ref()))?;
        let description = ledger.alloc(Node::string(descriptor.description()))?;
        entries.push(ledger.alloc(Node::record(
            SERVICE_LAYOUT,
            vec![Some(name), Some(class), Some(description)],
        ))?);
    }
    let root = ledger.alloc(Node::list(entries))?;
    Ok(Value::new(TypeTable::new().with(layout), ledger, root)?.with_label("HELP::services"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uda_protocol::{NodeData, RequestModel, StatusCode};

    use super::*;
    use crate::descriptor::PluginClass;

    fn invoke(text: &str, services: Vec<PluginDescriptor>) -> Result<Value, PluginFailure> {
        let call = PluginCall {
            request: RequestModel::parse(text, "").expect("request parses"),
            data: None,
            services: Arc::from(services),
        };
        let mut slot = ResultSlot::new();
        HelpPlugin.invoke(&call, &mut slot)?;
        Ok(slot.take().expect("value"))
    }

    fn text_of(node: &Node) -> &str {
        match node.data() {
            NodeData::Text(lines) => lines.first().map_or("", String::as_str),
            other => panic!("expected text, found {other:?}"),
        }
    }

    #[test]
    fn ping_reports_version_and_time() {
        let value = invoke("HELP::ping()", Vec::new()).expect("ping");
        assert_eq!(value.kind(), TypeKind::Compound(PING_LAYOUT.to_owned()));
        let version = value.field("server_version").expect("version field");
        assert_eq!(text_of(version), env!("CARGO_PKG_VERSION"));
        let timestamp = value.field("timestamp").expect("timestamp field");
        assert!(matches!(timestamp.data(), NodeData::Atomic(ArrayData::UInt64(seconds)) if seconds[0] > 0));
    }

    #[test]
    fn services_lists_public_plugins() {
        let services = vec![
            PluginDescriptor::new("BYTES", PluginClass::File).with_description("file bytes"),
            PluginDescriptor::new("SECRET", PluginClass::Other).private(),
            PluginDescriptor::new("HELP", PluginClass::Function),
        ];
        let value = invoke("HELP::services()", services).expect("services");
        assert_eq!(value.kind(), TypeKind::List);
        assert_eq!(value.count(), 2);

        let NodeData::List(children) = value.root_node().data() else {
            panic!("expected a list");
        };
        let first = children[0];
        let name = value.record_field(first, "name").expect("name");
        let class = value.record_field(first, "class").expect("class");
        assert_eq!(text_of(name), "BYTES");
        assert_eq!(text_of(class), "file");
    }

    #[test]
    fn unknown_function_is_unsupported() {
        let failure = invoke("HELP::explain()", Vec::new()).expect_err("unsupported");
        assert_eq!(failure.code, StatusCode::UNSUPPORTED_OPERATION);
        assert!(failure.message.contains("explain"));
    }
}
