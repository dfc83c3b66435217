//! Runtime state nodes and their protocol views.
//!
//! A node is a snapshot of one entity taken while the handle table is
//! locked. Which protocol shapes a node can produce is declared through the
//! `as_*` accessors; callers skip nodes that lack the capability they need.

#![allow(missing_docs)]

use smol_str::SmolStr;

use papyrus_runtime::vm::{FrameInfo, StackId, VmValue};
use papyrus_runtime::DebugError;

use crate::protocol::{Scope, Source, StackFrame, Thread, Variable};

use super::path::{NodePath, ScopeKind};

pub trait ThreadView {
    fn to_thread(&self) -> Result<Thread, DebugError>;
}

pub trait StackFrameView {
    fn to_stack_frame(&self) -> Result<StackFrame, DebugError>;
}

pub trait ScopeView {
    fn to_scope(&self) -> Result<Scope, DebugError>;
}

pub trait VariableView {
    fn to_variable(&self) -> Result<Variable, DebugError>;
}

pub trait StateNode: Send + std::fmt::Debug {
    fn path(&self) -> &NodePath;

    /// Handle issued for this node, if it is addressable by id.
    fn handle(&self) -> Option<u32> {
        None
    }

    fn as_thread(&self) -> Option<&dyn ThreadView> {
        None
    }

    fn as_stack_frame(&self) -> Option<&dyn StackFrameView> {
        None
    }

    fn as_scope(&self) -> Option<&dyn ScopeView> {
        None
    }

    fn as_variable(&self) -> Option<&dyn VariableView> {
        None
    }
}

/// The VM itself; parent of every thread.
#[derive(Debug, Default)]
pub struct RootNode {
    path: NodePath,
}

impl StateNode for RootNode {
    fn path(&self) -> &NodePath {
        &self.path
    }
}

#[derive(Debug)]
pub struct ThreadNode {
    path: NodePath,
    stack: StackId,
    /// Script and function of the top frame.
    top: Option<(SmolStr, SmolStr)>,
}

impl ThreadNode {
    #[must_use]
    pub fn new(stack: StackId, top: Option<&FrameInfo>) -> Self {
        Self {
            path: NodePath::thread(stack),
            stack,
            top: top.map(|frame| (frame.script_name.clone(), frame.function_name.clone())),
        }
    }
}

impl StateNode for ThreadNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn as_thread(&self) -> Option<&dyn ThreadView> {
        Some(self)
    }
}

impl ThreadView for ThreadNode {
    fn to_thread(&self) -> Result<Thread, DebugError> {
        let name = match &self.top {
            Some((script, function)) => format!("{} ({script}.{function})", self.stack),
            None => self.stack.to_string(),
        };
        Ok(Thread {
            id: self.stack.0,
            name,
        })
    }
}

#[derive(Debug)]
pub struct FrameNode {
    path: NodePath,
    handle: Option<u32>,
    frame: FrameInfo,
    source: Option<Source>,
}

impl FrameNode {
    #[must_use]
    pub fn new(path: NodePath, handle: Option<u32>, frame: FrameInfo, source: Option<Source>) -> Self {
        Self {
            path,
            handle,
            frame,
            source,
        }
    }
}

impl StateNode for FrameNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn handle(&self) -> Option<u32> {
        self.handle
    }

    fn as_stack_frame(&self) -> Option<&dyn StackFrameView> {
        Some(self)
    }
}

impl StackFrameView for FrameNode {
    fn to_stack_frame(&self) -> Result<StackFrame, DebugError> {
        // Frames of a running thread are a snapshot without a handle.
        let id = self.handle.unwrap_or(0);
        let mut name = format!("{}.{}", self.frame.script_name, self.frame.function_name);
        if self.frame.is_native {
            name.push_str(" [native]");
        }
        let line = self.frame.line.unwrap_or(0);
        Ok(StackFrame {
            id,
            name,
            source: self.source.clone(),
            line,
            column: u32::from(line > 0),
        })
    }
}

#[derive(Debug)]
pub struct ScopeNode {
    path: NodePath,
    handle: u32,
    kind: ScopeKind,
    named: usize,
}

impl ScopeNode {
    #[must_use]
    pub fn new(path: NodePath, handle: u32, kind: ScopeKind, named: usize) -> Self {
        Self {
            path,
            handle,
            kind,
            named,
        }
    }
}

impl StateNode for ScopeNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn handle(&self) -> Option<u32> {
        Some(self.handle)
    }

    fn as_scope(&self) -> Option<&dyn ScopeView> {
        Some(self)
    }
}

impl ScopeView for ScopeNode {
    fn to_scope(&self) -> Result<Scope, DebugError> {
        Ok(Scope {
            name: self.kind.display_name().to_string(),
            variables_reference: self.handle,
            expensive: false,
            named_variables: Some(u32::try_from(self.named).unwrap_or(u32::MAX)),
        })
    }
}

/// Argument, local, property or array element.
#[derive(Debug)]
pub struct ValueNode {
    path: NodePath,
    handle: Option<u32>,
    name: SmolStr,
    value: VmValue,
}

impl ValueNode {
    #[must_use]
    pub fn new(path: NodePath, handle: Option<u32>, name: SmolStr, value: VmValue) -> Self {
        Self {
            path,
            handle,
            name,
            value,
        }
    }
}

impl StateNode for ValueNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn handle(&self) -> Option<u32> {
        self.handle
    }

    fn as_variable(&self) -> Option<&dyn VariableView> {
        Some(self)
    }
}

impl VariableView for ValueNode {
    fn to_variable(&self) -> Result<Variable, DebugError> {
        let variables_reference = match (is_expandable(&self.value), self.handle) {
            (true, Some(handle)) => handle,
            (true, None) => return Err(missing_handle(&self.path)),
            (false, _) => 0,
        };
        let indexed_variables = match &self.value {
            VmValue::Array { elements, .. } => {
                Some(u32::try_from(elements.len()).unwrap_or(u32::MAX))
            }
            _ => None,
        };
        Ok(Variable {
            name: self.name.to_string(),
            value: render_value(&self.value),
            r#type: value_type(&self.value),
            variables_reference,
            indexed_variables,
        })
    }
}

fn missing_handle(path: &NodePath) -> DebugError {
    DebugError::SerializationFailure(SmolStr::new(format!("node '{path}' has no handle")))
}

/// Whether the client can expand the value into children.
#[must_use]
pub fn is_expandable(value: &VmValue) -> bool {
    match value {
        VmValue::Object { .. } => true,
        VmValue::Array { elements, .. } => !elements.is_empty(),
        _ => false,
    }
}

/// Papyrus-style display text for a value.
#[must_use]
pub fn render_value(value: &VmValue) -> String {
    match value {
        VmValue::None => "None".to_string(),
        VmValue::Bool(true) => "True".to_string(),
        VmValue::Bool(false) => "False".to_string(),
        VmValue::Int(value) => value.to_string(),
        VmValue::Float(value) => format!("{value:?}"),
        VmValue::String(value) => format!("\"{value}\""),
        VmValue::Object { type_name, id } => format!("[{type_name} {}]", id.0),
        VmValue::Array {
            element_type,
            elements,
        } => format!("{element_type}[{}]", elements.len()),
    }
}

#[must_use]
pub fn value_type(value: &VmValue) -> Option<String> {
    match value {
        VmValue::None => None,
        VmValue::Bool(_) => Some("Bool".to_string()),
        VmValue::Int(_) => Some("Int".to_string()),
        VmValue::Float(_) => Some("Float".to_string()),
        VmValue::String(_) => Some("String".to_string()),
        VmValue::Object { type_name, .. } => Some(type_name.to_string()),
        VmValue::Array { element_type, .. } => Some(format!("{element_type}[]")),
    }
}
