//! Papyrus VM collaborator interfaces.
//!
//! The host VM owns stacks, frames and objects. The debugger never holds
//! pointers into that graph: everything here is either a stable identity
//! (stack id, frame index, object id) or a value snapshot taken under the
//! VM's own lock.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::DebugError;

/// Identity of one VM stack (an independently scheduled execution thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(pub u32);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a script object instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

/// Raw bytecode opcode as reported by the instruction hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u8);

/// Papyrus value snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum VmValue {
    None,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(SmolStr),
    /// Object reference; properties are fetched lazily by id.
    Object {
        type_name: SmolStr,
        id: ObjectId,
    },
    Array {
        element_type: SmolStr,
        elements: Vec<VmValue>,
    },
}

/// Named value (argument, local or property).
#[derive(Debug, Clone, PartialEq)]
pub struct VmVariable {
    pub name: SmolStr,
    pub value: VmValue,
}

impl VmVariable {
    #[must_use]
    pub fn new(name: impl Into<SmolStr>, value: VmValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Snapshot of one call frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Owning object type (the script name).
    pub script_name: SmolStr,
    pub function_name: SmolStr,
    /// Source file recorded in the script's debug info, if any.
    pub source_file: Option<SmolStr>,
    /// Current line, translated from the frame's instruction pointer.
    pub line: Option<u32>,
    pub is_native: bool,
    /// Arguments followed by locals.
    pub locals: Vec<VmVariable>,
    /// Bound `Self` object for non-global functions.
    pub self_object: Option<VmValue>,
}

/// Log severity reported by the VM's error logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// Log line raised by script code or the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
    /// Originating module (plugin), when the VM reports one.
    pub module: Option<SmolStr>,
}

/// View of the thread currently dispatching an instruction.
///
/// Implementations are borrowed from the VM for the duration of a single
/// hook call and must be cheap: the hit test queries them once per
/// instruction.
pub trait ExecutingThread {
    fn stack_id(&self) -> StackId;

    /// Call-frame nesting depth, 1 for the outermost frame.
    fn call_depth(&self) -> u32;

    /// Whether the top frame's function is native.
    fn is_native(&self) -> bool;

    /// Owning object type of the top frame.
    fn script_name(&self) -> &str;

    /// Translate the top frame's instruction pointer to a source line.
    fn current_line(&self) -> Option<u32>;
}

/// Callbacks raised by the VM. All run on VM threads.
pub trait VmHooks: Send + Sync {
    fn stack_created(&self, _stack: StackId) {}

    fn stack_destroyed(&self, _stack: StackId) {}

    /// Called before every instruction of every non-native call.
    fn instruction(&self, _thread: &dyn ExecutingThread, _opcode: Opcode) {}

    fn log(&self, _event: &LogEvent) {}
}

/// Registration id returned by [`VirtualMachine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Enumeration and hook surface of the host VM.
pub trait VirtualMachine: Send + Sync {
    /// Ids of all stacks that currently have a top frame.
    fn running_stacks(&self) -> Vec<StackId>;

    /// Frames of a stack, innermost first, or `None` if the stack is gone.
    fn stack_frames(&self, stack: StackId) -> Option<Vec<FrameInfo>>;

    /// Properties of a live object.
    fn object_properties(&self, object: ObjectId) -> Option<Vec<VmVariable>>;

    /// Names of every script type the VM has loaded.
    fn loaded_scripts(&self) -> Vec<SmolStr>;

    fn subscribe(&self, hooks: Arc<dyn VmHooks>) -> Result<HookId, DebugError>;

    fn unsubscribe(&self, id: HookId);
}

/// Hook registration owned by a debug session.
///
/// Dropping the subscription unregisters the hooks, so nothing the session
/// installed outlives it.
pub struct Subscription {
    vm: Arc<dyn VirtualMachine>,
    id: Option<HookId>,
}

impl Subscription {
    /// Register `hooks` with `vm`.
    pub fn acquire(
        vm: Arc<dyn VirtualMachine>,
        hooks: Arc<dyn VmHooks>,
    ) -> Result<Self, DebugError> {
        let id = vm.subscribe(hooks)?;
        tracing::debug!(hook = id.0, "subscribed to VM events");
        Ok(Self { vm, id: Some(id) })
    }

    /// Unregister now. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.vm.unsubscribe(id);
            tracing::debug!(hook = id.0, "unsubscribed from VM events");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
