//! Runtime state tree: live VM entities addressed by path or handle.
//!
//! Nothing here caches VM objects. Every resolution walks the live VM from
//! stable identities (stack id, frame index, member names), so a handle
//! whose entity has gone away resolves to `UnknownHandle` instead of stale
//! data. Handles are only issued for suspended threads and are reclaimed
//! when the owning thread resumes or exits. Frames of a running thread are
//! listed without a handle and cannot be expanded.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use papyrus_runtime::debug::SuspensionObserver;
use papyrus_runtime::vm::{FrameInfo, StackId, VirtualMachine, VmValue, VmVariable};
use papyrus_runtime::DebugError;

use super::ids::IdProvider;
use super::nodes::{
    is_expandable, FrameNode, RootNode, ScopeNode, StateNode, ThreadNode, ValueNode,
};
use super::path::{Member, NodeKind, NodePath, ScopeKind};
use super::sources::SourceCatalog;

pub type NodeList = Vec<Box<dyn StateNode>>;

#[derive(Debug, Default)]
struct HandleTable {
    ids: IdProvider,
    by_handle: FxHashMap<u32, NodePath>,
    by_path: FxHashMap<NodePath, u32>,
    suspended: FxHashSet<StackId>,
}

impl HandleTable {
    fn is_suspended(&self, path: &NodePath) -> bool {
        path.stack().is_some_and(|stack| self.suspended.contains(&stack))
    }

    fn handle_for(&mut self, path: &NodePath) -> u32 {
        if let Some(handle) = self.by_path.get(path) {
            return *handle;
        }
        let handle = self.ids.allocate();
        self.by_handle.insert(handle, path.clone());
        self.by_path.insert(path.clone(), handle);
        handle
    }

    fn release_thread(&mut self, stack: StackId) -> usize {
        self.suspended.remove(&stack);
        let stale = self
            .by_handle
            .iter()
            .filter(|(_, path)| path.is_within_thread(stack))
            .map(|(handle, _)| *handle)
            .collect::<Vec<_>>();
        for handle in &stale {
            if let Some(path) = self.by_handle.remove(handle) {
                self.by_path.remove(&path);
            }
            self.ids.release(*handle);
        }
        stale.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.by_handle.clear();
        self.by_path.clear();
        self.suspended.clear();
    }
}

/// Lazily materialized view of the VM's threads, frames, scopes and
/// variables.
///
/// The table lock is held for the whole of a resolution, so a concurrent
/// reclaim lands before or after it, never in between.
pub struct RuntimeState {
    vm: Arc<dyn VirtualMachine>,
    sources: Arc<SourceCatalog>,
    table: Mutex<HandleTable>,
}

impl RuntimeState {
    #[must_use]
    pub fn new(vm: Arc<dyn VirtualMachine>, sources: Arc<SourceCatalog>) -> Self {
        Self {
            vm,
            sources,
            table: Mutex::new(HandleTable::default()),
        }
    }

    /// Resolve a node by its path string (`""` is the VM root, `"12"` is
    /// stack 12).
    #[must_use]
    pub fn resolve_by_path(&self, path: &str) -> Option<Box<dyn StateNode>> {
        let path = path.parse::<NodePath>().ok()?;
        let mut table = self.table.lock();
        self.materialize(&mut table, &path)
    }

    #[must_use]
    pub fn resolve_children_by_parent_path(&self, path: &str) -> Option<NodeList> {
        let path = path.parse::<NodePath>().ok()?;
        let mut table = self.table.lock();
        self.children(&mut table, &path)
    }

    /// Children of the node behind `handle`.
    pub fn resolve_children_by_parent_id(&self, handle: u32) -> Result<NodeList, DebugError> {
        let mut table = self.table.lock();
        let path = table
            .by_handle
            .get(&handle)
            .cloned()
            .ok_or(DebugError::UnknownHandle(handle))?;
        if !table.is_suspended(&path) {
            return Err(DebugError::UnknownHandle(handle));
        }
        self.children(&mut table, &path)
            .ok_or(DebugError::UnknownHandle(handle))
    }

    /// Reclaim every handle issued under `stack`.
    pub fn invalidate_thread(&self, stack: StackId) -> usize {
        let released = self.table.lock().release_thread(stack);
        if released > 0 {
            tracing::debug!(thread = %stack, handles = released, "handles reclaimed");
        }
        released
    }

    pub fn clear(&self) {
        self.table.lock().clear();
    }

    #[must_use]
    pub fn is_suspended(&self, stack: StackId) -> bool {
        self.table.lock().suspended.contains(&stack)
    }

    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.table.lock().ids.len()
    }

    fn materialize(&self, table: &mut HandleTable, path: &NodePath) -> Option<Box<dyn StateNode>> {
        match path.kind() {
            NodeKind::Root => Some(Box::new(RootNode::default())),
            NodeKind::Thread => {
                let stack = path.stack()?;
                let frames = self.vm.stack_frames(stack)?;
                Some(Box::new(ThreadNode::new(stack, frames.first())))
            }
            NodeKind::Frame => {
                let frame = self.frame_at(path)?;
                Some(Box::new(self.frame_node(table, path.clone(), frame)))
            }
            NodeKind::Scope | NodeKind::Variable if !table.is_suspended(path) => None,
            NodeKind::Scope => {
                let frame = self.frame_at(path)?;
                let kind = path.scope_kind()?;
                let named = self.scope_members(&frame, kind)?.len();
                let handle = table.handle_for(path);
                Some(Box::new(ScopeNode::new(path.clone(), handle, kind, named)))
            }
            NodeKind::Variable => {
                let value = self.value_at(path)?;
                let name = path.leaf_name()?;
                Some(Box::new(value_node(table, path.clone(), name, value)))
            }
        }
    }

    fn children(&self, table: &mut HandleTable, path: &NodePath) -> Option<NodeList> {
        match path.kind() {
            NodeKind::Root => Some(
                self.vm
                    .running_stacks()
                    .into_iter()
                    .filter_map(|stack| {
                        let frames = self.vm.stack_frames(stack)?;
                        Some(Box::new(ThreadNode::new(stack, frames.first())) as Box<dyn StateNode>)
                    })
                    .collect(),
            ),
            NodeKind::Thread => {
                let stack = path.stack()?;
                let frames = self.vm.stack_frames(stack)?;
                Some(
                    frames
                        .into_iter()
                        .zip(0_u32..)
                        .map(|(frame, index)| {
                            let path = NodePath::frame(stack, index);
                            Box::new(self.frame_node(table, path, frame)) as Box<dyn StateNode>
                        })
                        .collect(),
                )
            }
            NodeKind::Frame | NodeKind::Scope | NodeKind::Variable
                if !table.is_suspended(path) =>
            {
                None
            }
            NodeKind::Frame => {
                let frame = self.frame_at(path)?;
                let (stack, index) = (path.stack()?, path.frame_index()?);
                let mut scopes: NodeList = Vec::new();
                for kind in [ScopeKind::Local, ScopeKind::SelfObject] {
                    let Some(members) = self.scope_members(&frame, kind) else {
                        continue;
                    };
                    let scope_path = NodePath::scope(stack, index, kind);
                    let handle = table.handle_for(&scope_path);
                    scopes.push(Box::new(ScopeNode::new(
                        scope_path,
                        handle,
                        kind,
                        members.len(),
                    )));
                }
                Some(scopes)
            }
            NodeKind::Scope | NodeKind::Variable => {
                let members = self.members_at(path)?;
                Some(
                    members
                        .into_iter()
                        .map(|(member, variable)| {
                            let child = path.child(member);
                            Box::new(value_node(table, child, variable.name, variable.value))
                                as Box<dyn StateNode>
                        })
                        .collect(),
                )
            }
        }
    }

    fn frame_node(&self, table: &mut HandleTable, path: NodePath, frame: FrameInfo) -> FrameNode {
        let handle = table.is_suspended(&path).then(|| table.handle_for(&path));
        let source = if frame.is_native {
            None
        } else {
            self.sources.source_for_script(&frame.script_name)
        };
        FrameNode::new(path, handle, frame, source)
    }

    fn frame_at(&self, path: &NodePath) -> Option<FrameInfo> {
        let frames = self.vm.stack_frames(path.stack()?)?;
        let index = usize::try_from(path.frame_index()?).ok()?;
        frames.into_iter().nth(index)
    }

    /// Variables of a scope. `None` when the frame has no such scope.
    fn scope_members(&self, frame: &FrameInfo, kind: ScopeKind) -> Option<Vec<VmVariable>> {
        match kind {
            ScopeKind::Local => Some(frame.locals.clone()),
            ScopeKind::SelfObject => match frame.self_object.as_ref()? {
                VmValue::Object { id, .. } => {
                    Some(self.vm.object_properties(*id).unwrap_or_default())
                }
                _ => None,
            },
        }
    }

    /// Members directly below a scope or variable path.
    fn members_at(&self, path: &NodePath) -> Option<Vec<(Member, VmVariable)>> {
        if path.kind() == NodeKind::Scope {
            let frame = self.frame_at(path)?;
            let variables = self.scope_members(&frame, path.scope_kind()?)?;
            return Some(named_members(variables));
        }
        let value = self.value_at(path)?;
        self.value_members(value)
    }

    fn value_members(&self, value: VmValue) -> Option<Vec<(Member, VmVariable)>> {
        match value {
            VmValue::Object { id, .. } => Some(named_members(self.vm.object_properties(id)?)),
            VmValue::Array { elements, .. } => Some(
                elements
                    .into_iter()
                    .zip(0_u32..)
                    .map(|(value, index)| {
                        let member = Member::Index(index);
                        let name = SmolStr::new(member.to_string());
                        (member, VmVariable { name, value })
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Walk from the scope down the member chain against live state.
    fn value_at(&self, path: &NodePath) -> Option<VmValue> {
        let frame = self.frame_at(path)?;
        let variables = self.scope_members(&frame, path.scope_kind()?)?;
        let (first, rest) = path.members().split_first()?;
        let mut current = find_member(named_members(variables), first)?;
        for member in rest {
            let members = self.value_members(current)?;
            current = find_member(members, member)?;
        }
        Some(current)
    }
}

impl SuspensionObserver for RuntimeState {
    fn thread_suspended(&self, stack: StackId) {
        self.table.lock().suspended.insert(stack);
    }

    fn thread_resumed(&self, stack: StackId) {
        self.invalidate_thread(stack);
    }
}

impl std::fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeState")
            .field("handles", &self.table.lock().ids.len())
            .finish_non_exhaustive()
    }
}

fn value_node(table: &mut HandleTable, path: NodePath, name: SmolStr, value: VmValue) -> ValueNode {
    let handle = is_expandable(&value).then(|| table.handle_for(&path));
    ValueNode::new(path, handle, name, value)
}

fn named_members(variables: Vec<VmVariable>) -> Vec<(Member, VmVariable)> {
    variables
        .into_iter()
        .map(|variable| (Member::Name(variable.name.clone()), variable))
        .collect()
}

fn find_member(members: Vec<(Member, VmVariable)>, wanted: &Member) -> Option<VmValue> {
    members
        .into_iter()
        .find(|(member, _)| match (member, wanted) {
            (Member::Name(have), Member::Name(want)) => have.eq_ignore_ascii_case(want),
            (Member::Index(have), Member::Index(want)) => have == want,
            _ => false,
        })
        .map(|(_, variable)| variable.value)
}
