// ── Filter predicates for change listeners ──
//
// Most consumers care about one resource kind, or one resource. These
// let them say so at registration instead of re-checking in every
// callback.

use livewire_api::ChangeEvent;

/// Filter predicate for change events.
pub enum ChangeFilter {
    All,
    Kind(String),
    Action(String),
    KindAndId { kind: String, id: String },
    Custom(Box<dyn Fn(&ChangeEvent) -> bool + Send + Sync>),
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => event.kind == *kind,
            Self::Action(action) => event.action == *action,
            Self::KindAndId { kind, id } => event.kind == *kind && event.id == *id,
            Self::Custom(f) => f(event),
        }
    }
}

impl std::fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Self::KindAndId { kind, id } => f
                .debug_struct("KindAndId")
                .field("kind", kind)
                .field("id", id)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated_connection() -> ChangeEvent {
        ChangeEvent::new("updated", "connection", "abc")
    }

    #[test]
    fn simple_filters() {
        let event = updated_connection();
        assert!(ChangeFilter::All.matches(&event));
        assert!(ChangeFilter::Kind("connection".into()).matches(&event));
        assert!(!ChangeFilter::Kind("integration".into()).matches(&event));
        assert!(ChangeFilter::Action("updated".into()).matches(&event));
        assert!(!ChangeFilter::Action("deleted".into()).matches(&event));
    }

    #[test]
    fn kind_and_id_needs_both() {
        let event = updated_connection();
        let exact = ChangeFilter::KindAndId {
            kind: "connection".into(),
            id: "abc".into(),
        };
        let other_id = ChangeFilter::KindAndId {
            kind: "connection".into(),
            id: "xyz".into(),
        };
        assert!(exact.matches(&event));
        assert!(!other_id.matches(&event));
    }

    #[test]
    fn custom_predicate() {
        let filter = ChangeFilter::Custom(Box::new(|e| e.id.starts_with('a')));
        assert!(filter.matches(&updated_connection()));
        assert_eq!(format!("{filter:?}"), "Custom(..)");
    }
}
