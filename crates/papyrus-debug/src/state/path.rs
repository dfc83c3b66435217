//! Stable hierarchical node names.
//!
//! A path names a node by identities that survive a resume: stack id, frame
//! index (0 = innermost), scope kind, then member names or array indices.
//! `"12/0/local/Target/[3]"` is element 3 of local `Target` in the innermost
//! frame of stack 12. The empty path is the VM root.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use papyrus_runtime::vm::StackId;

/// Variable scope exposed per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Arguments and locals.
    Local,
    /// Properties of the frame's bound object.
    SelfObject,
}

impl ScopeKind {
    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            ScopeKind::Local => "local",
            ScopeKind::SelfObject => "self",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ScopeKind::Local => "Local",
            ScopeKind::SelfObject => "Self",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "local" => Some(ScopeKind::Local),
            "self" => Some(ScopeKind::SelfObject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    Name(SmolStr),
    Index(u32),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Name(name) => f.write_str(name),
            Member::Index(index) => write!(f, "[{index}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Thread,
    Frame,
    Scope,
    Variable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    stack: Option<StackId>,
    frame: Option<u32>,
    scope: Option<ScopeKind>,
    members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPath(pub String);

impl fmt::Display for InvalidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node path '{}'", self.0)
    }
}

impl std::error::Error for InvalidPath {}

impl NodePath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn thread(stack: StackId) -> Self {
        Self {
            stack: Some(stack),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn frame(stack: StackId, frame: u32) -> Self {
        Self {
            stack: Some(stack),
            frame: Some(frame),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scope(stack: StackId, frame: u32, scope: ScopeKind) -> Self {
        Self {
            stack: Some(stack),
            frame: Some(frame),
            scope: Some(scope),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match (self.stack, self.frame, self.scope, self.members.is_empty()) {
            (None, _, _, _) => NodeKind::Root,
            (Some(_), None, _, _) => NodeKind::Thread,
            (Some(_), Some(_), None, _) => NodeKind::Frame,
            (Some(_), Some(_), Some(_), true) => NodeKind::Scope,
            (Some(_), Some(_), Some(_), false) => NodeKind::Variable,
        }
    }

    #[must_use]
    pub fn stack(&self) -> Option<StackId> {
        self.stack
    }

    #[must_use]
    pub fn frame_index(&self) -> Option<u32> {
        self.frame
    }

    #[must_use]
    pub fn scope_kind(&self) -> Option<ScopeKind> {
        self.scope
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Path of a member below this scope or variable.
    #[must_use]
    pub fn child(&self, member: Member) -> Self {
        let mut child = self.clone();
        child.members.push(member);
        child
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        if parent.members.pop().is_some() {
            return Some(parent);
        }
        if parent.scope.take().is_some() {
            return Some(parent);
        }
        if parent.frame.take().is_some() {
            return Some(parent);
        }
        parent.stack.take().map(|_| parent)
    }

    #[must_use]
    pub fn is_within_thread(&self, stack: StackId) -> bool {
        self.stack == Some(stack)
    }

    /// Last member name, or the element index for array members.
    #[must_use]
    pub fn leaf_name(&self) -> Option<SmolStr> {
        self.members.last().map(|member| match member {
            Member::Name(name) => name.clone(),
            Member::Index(_) => SmolStr::new(member.to_string()),
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(stack) = self.stack else {
            return Ok(());
        };
        write!(f, "{stack}")?;
        if let Some(frame) = self.frame {
            write!(f, "/{frame}")?;
        }
        if let Some(scope) = self.scope {
            write!(f, "/{}", scope.segment())?;
        }
        for member in &self.members {
            write!(f, "/{member}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = InvalidPath;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPath(text.to_string());
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = text.split('/');
        let mut path = Self::root();

        let stack = segments.next().ok_or_else(invalid)?;
        path.stack = Some(StackId(stack.parse().map_err(|_| invalid())?));
        if let Some(frame) = segments.next() {
            path.frame = Some(frame.parse().map_err(|_| invalid())?);
        }
        if let Some(scope) = segments.next() {
            path.scope = Some(ScopeKind::from_segment(scope).ok_or_else(invalid)?);
        }
        for segment in segments {
            let member = match segment
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                Some(index) => Member::Index(index.parse().map_err(|_| invalid())?),
                None if !segment.is_empty() => Member::Name(SmolStr::new(segment)),
                None => return Err(invalid()),
            };
            path.members.push(member);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let path = NodePath::scope(StackId(12), 0, ScopeKind::Local)
            .child(Member::Name("Target".into()))
            .child(Member::Index(3));
        assert_eq!(path.to_string(), "12/0/local/Target/[3]");
        assert_eq!("12/0/local/Target/[3]".parse::<NodePath>().unwrap(), path);
        assert_eq!(path.kind(), NodeKind::Variable);
        assert_eq!(path.leaf_name().as_deref(), Some("[3]"));
    }

    #[test]
    fn parents_walk_back_to_root() {
        let path: NodePath = "4/1/self/Count".parse().unwrap();
        let kinds = std::iter::successors(Some(path), NodePath::parent)
            .map(|path| path.kind())
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Variable,
                NodeKind::Scope,
                NodeKind::Frame,
                NodeKind::Thread,
                NodeKind::Root
            ]
        );
    }

    #[test]
    fn rejects_malformed_segments() {
        assert!("abc".parse::<NodePath>().is_err());
        assert!("1/x".parse::<NodePath>().is_err());
        assert!("1/0/globals".parse::<NodePath>().is_err());
        assert!("1/0/local/[x]".parse::<NodePath>().is_err());
        assert!("1/0/local//a".parse::<NodePath>().is_err());
        assert_eq!("".parse::<NodePath>().unwrap().kind(), NodeKind::Root);
    }
}
