use super::ids::MessageNamespace;

/// Unread state of one message namespace of a peer, as reported by the
/// read-state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamespaceReadState {
    pub count: i32,
    pub is_unread: bool,
    pub marked_unread: bool,
}

/// Read state of a peer across all its message namespaces. An empty state
/// contributes nothing to any counter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CombinedReadState {
    pub states: Vec<(MessageNamespace, NamespaceReadState)>,
}

impl CombinedReadState {
    pub fn count(&self) -> i32 {
        self.states
            .iter()
            .fold(0i32, |total, (_, state)| total.saturating_add(state.count))
    }

    pub fn is_unread(&self) -> bool {
        self.states.iter().any(|(_, state)| state.is_unread)
    }

    pub fn marked_unread(&self) -> bool {
        self.states.iter().any(|(_, state)| state.marked_unread)
    }

    pub fn state(&self, namespace: MessageNamespace) -> Option<NamespaceReadState> {
        self.states
            .iter()
            .find(|(candidate, _)| *candidate == namespace)
            .map(|(_, state)| *state)
    }
}
