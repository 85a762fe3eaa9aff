//! Editor selection state passed to operators.

use crate::object::ObjectId;

/// Snapshot of the editor's selection when an operator is invoked.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// The active object, if any.
    pub active: Option<ObjectId>,
    /// Every selected object, including ones on hidden layers.
    pub selected: Vec<ObjectId>,
    /// Selected objects that can be edited (on an active layer).
    pub editable: Vec<ObjectId>,
}

impl Selection {
    /// Selection with a single active, editable object.
    pub fn single(id: ObjectId) -> Self {
        Self {
            active: Some(id),
            selected: vec![id],
            editable: vec![id],
        }
    }
}
