//! Scriptable stand-in for the Papyrus VM.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::DebugError;
use crate::vm::{
    ExecutingThread, FrameInfo, HookId, LogEvent, ObjectId, Opcode, Severity, StackId,
    VirtualMachine, VmHooks, VmVariable,
};

/// Script frame at `line` with no locals.
#[must_use]
pub fn frame(script: &str, function: &str, line: u32) -> FrameInfo {
    FrameInfo {
        script_name: SmolStr::new(script),
        function_name: SmolStr::new(function),
        source_file: Some(SmolStr::new(format!("{script}.psc"))),
        line: Some(line),
        is_native: false,
        locals: Vec::new(),
        self_object: None,
    }
}

/// Executing-thread snapshot handed to the instruction hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestThread {
    pub stack: StackId,
    pub depth: u32,
    pub native: bool,
    pub script: SmolStr,
    pub line: Option<u32>,
}

impl TestThread {
    #[must_use]
    pub fn new(stack: StackId, script: &str, line: Option<u32>) -> Self {
        Self {
            stack,
            depth: 1,
            native: false,
            script: SmolStr::new(script),
            line,
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn native(mut self) -> Self {
        self.native = true;
        self
    }
}

impl ExecutingThread for TestThread {
    fn stack_id(&self) -> StackId {
        self.stack
    }

    fn call_depth(&self) -> u32 {
        self.depth
    }

    fn is_native(&self) -> bool {
        self.native
    }

    fn script_name(&self) -> &str {
        &self.script
    }

    fn current_line(&self) -> Option<u32> {
        self.line
    }
}

#[derive(Debug, Default)]
struct VmState {
    /// Frames per stack, outermost first.
    stacks: BTreeMap<StackId, Vec<FrameInfo>>,
    objects: FxHashMap<ObjectId, Vec<VmVariable>>,
    scripts: Vec<SmolStr>,
    next_stack: u32,
}

/// In-memory VM whose stacks are driven explicitly by the caller.
///
/// `execute` raises the instruction hook on the calling thread, so a test
/// that expects a stop runs it on a spawned thread.
pub struct TestVm {
    state: RwLock<VmState>,
    hooks: RwLock<Vec<(HookId, Arc<dyn VmHooks>)>>,
    next_hook: AtomicU64,
    available: AtomicBool,
}

impl TestVm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(VmState::default()),
            hooks: RwLock::new(Vec::new()),
            next_hook: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Make `subscribe` fail, as when the VM cannot be reached.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Create a stack with `frames` (outermost first) and raise `stack_created`.
    pub fn spawn_stack(&self, frames: Vec<FrameInfo>) -> StackId {
        let stack = {
            let mut state = self.state.write();
            state.next_stack += 1;
            let stack = StackId(state.next_stack);
            for frame in &frames {
                if !state.scripts.contains(&frame.script_name) {
                    state.scripts.push(frame.script_name.clone());
                }
            }
            state.stacks.insert(stack, frames);
            stack
        };
        for hooks in self.hooks() {
            hooks.stack_created(stack);
        }
        stack
    }

    pub fn destroy_stack(&self, stack: StackId) {
        let removed = self.state.write().stacks.remove(&stack).is_some();
        if removed {
            for hooks in self.hooks() {
                hooks.stack_destroyed(stack);
            }
        }
    }

    pub fn push_frame(&self, stack: StackId, frame: FrameInfo) {
        if let Some(frames) = self.state.write().stacks.get_mut(&stack) {
            frames.push(frame);
        }
    }

    pub fn pop_frame(&self, stack: StackId) -> Option<FrameInfo> {
        self.state.write().stacks.get_mut(&stack)?.pop()
    }

    /// Move the top frame of `stack` to `line`.
    pub fn set_line(&self, stack: StackId, line: u32) {
        if let Some(top) = self
            .state
            .write()
            .stacks
            .get_mut(&stack)
            .and_then(|frames| frames.last_mut())
        {
            top.line = Some(line);
        }
    }

    pub fn add_object(&self, object: ObjectId, properties: Vec<VmVariable>) {
        self.state.write().objects.insert(object, properties);
    }

    pub fn add_loaded_script(&self, name: &str) {
        let mut state = self.state.write();
        let name = SmolStr::new(name);
        if !state.scripts.contains(&name) {
            state.scripts.push(name);
        }
    }

    /// Thread view of the top frame, as the instruction hook would see it.
    #[must_use]
    pub fn current_thread(&self, stack: StackId) -> Option<TestThread> {
        let state = self.state.read();
        let frames = state.stacks.get(&stack)?;
        let top = frames.last()?;
        Some(TestThread {
            stack,
            depth: u32::try_from(frames.len()).unwrap_or(u32::MAX),
            native: top.is_native,
            script: top.script_name.clone(),
            line: top.line,
        })
    }

    /// Raise the instruction hook for the top frame of `stack`.
    ///
    /// Blocks while a debugger keeps the thread suspended. Returns `false`
    /// if the stack has no frames.
    pub fn execute(&self, stack: StackId) -> bool {
        let Some(thread) = self.current_thread(stack) else {
            return false;
        };
        for hooks in self.hooks() {
            hooks.instruction(&thread, Opcode(0));
        }
        true
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.raise_log(LogEvent {
            severity,
            message: message.into(),
            module: None,
        });
    }

    /// Log line attributed to a plugin module.
    pub fn log_from(&self, module: &str, severity: Severity, message: impl Into<String>) {
        self.raise_log(LogEvent {
            severity,
            message: message.into(),
            module: Some(SmolStr::new(module)),
        });
    }

    fn raise_log(&self, event: LogEvent) {
        for hooks in self.hooks() {
            hooks.log(&event);
        }
    }

    fn hooks(&self) -> Vec<Arc<dyn VmHooks>> {
        self.hooks
            .read()
            .iter()
            .map(|(_, hooks)| Arc::clone(hooks))
            .collect()
    }
}

impl Default for TestVm {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualMachine for TestVm {
    fn running_stacks(&self) -> Vec<StackId> {
        self.state
            .read()
            .stacks
            .iter()
            .filter(|(_, frames)| !frames.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    fn stack_frames(&self, stack: StackId) -> Option<Vec<FrameInfo>> {
        let state = self.state.read();
        let frames = state.stacks.get(&stack)?;
        Some(frames.iter().rev().cloned().collect())
    }

    fn object_properties(&self, object: ObjectId) -> Option<Vec<VmVariable>> {
        self.state.read().objects.get(&object).cloned()
    }

    fn loaded_scripts(&self) -> Vec<SmolStr> {
        self.state.read().scripts.clone()
    }

    fn subscribe(&self, hooks: Arc<dyn VmHooks>) -> Result<HookId, DebugError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DebugError::VmUnavailable);
        }
        let id = HookId(self.next_hook.fetch_add(1, Ordering::SeqCst));
        self.hooks.write().push((id, hooks));
        Ok(id)
    }

    fn unsubscribe(&self, id: HookId) {
        self.hooks.write().retain(|(current, _)| *current != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Subscription, VmValue};

    #[test]
    fn frames_are_reported_innermost_first() {
        let vm = TestVm::new();
        let stack = vm.spawn_stack(vec![frame("Quest", "OnInit", 4)]);
        vm.push_frame(stack, frame("Utility", "Wait", 9));

        let frames = vm.stack_frames(stack).unwrap();
        assert_eq!(frames[0].function_name, "Wait");
        assert_eq!(frames[1].function_name, "OnInit");
        assert_eq!(vm.current_thread(stack).unwrap().depth, 2);
        assert_eq!(vm.running_stacks(), vec![stack]);
    }

    #[test]
    fn subscription_unregisters_on_drop() {
        let vm = Arc::new(TestVm::new());
        struct Nothing;
        impl VmHooks for Nothing {}

        let subscription = Subscription::acquire(vm.clone(), Arc::new(Nothing)).unwrap();
        assert!(subscription.is_active());
        assert_eq!(vm.hook_count(), 1);
        drop(subscription);
        assert_eq!(vm.hook_count(), 0);

        vm.set_available(false);
        assert_eq!(
            Subscription::acquire(vm.clone(), Arc::new(Nothing)).unwrap_err(),
            DebugError::VmUnavailable
        );
    }

    #[test]
    fn object_properties_round_trip() {
        let vm = TestVm::new();
        vm.add_object(
            ObjectId(7),
            vec![VmVariable::new("Count", VmValue::Int(3))],
        );
        assert_eq!(vm.object_properties(ObjectId(7)).unwrap().len(), 1);
        assert!(vm.object_properties(ObjectId(8)).is_none());
    }
}
