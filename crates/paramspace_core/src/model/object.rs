//! Identity, versioning and change propagation shared by all entities
//!
//! Each entity embeds an [`ObjectMeta`]. Containers own their children
//! outright; the child only remembers its parent's id. Upward notification is
//! an explicit call: after a container mutates a child, it takes the child's
//! unreported change with [`ObjectMeta::take_unreported_change`] and re-raises
//! the same kind on itself. Downward "clean" acknowledgement is done by
//! [`AnalysisObject::clear_dirty_flag`], which containers override to recurse.

use serde::{Deserialize, Serialize};

use super::ids::{ObjectId, VersionId};

/// Classification of a change, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// No effect on downstream results (names, descriptions, tags)
    Benign,
    /// Downstream cached results must be considered stale
    InvalidatesResults,
}

/// Identity, version and dirty state of one entity
///
/// Equality ignores the dirty flag and pending changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    id: ObjectId,
    version: VersionId,
    name: String,
    display_name: String,
    #[serde(default)]
    description: String,
    /// Always false after deserialization
    #[serde(skip)]
    dirty: bool,
    #[serde(default)]
    parent: Option<ObjectId>,
    #[serde(skip)]
    unreported: Option<ChangeType>,
}

impl ObjectMeta {
    /// Metadata for a brand new, unsaved object
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ObjectId::new(),
            version: VersionId::new(),
            display_name: name.clone(),
            name,
            description: String::new(),
            dirty: true,
            parent: None,
            unreported: None,
        }
    }

    /// Metadata reconstructed from persisted fields. The result is clean.
    #[must_use]
    pub fn from_parts(
        id: ObjectId,
        version: VersionId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            version,
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            dirty: false,
            parent: None,
            unreported: None,
        }
    }

    /// Copy of this metadata under a new identity: fresh id and version,
    /// dirty, detached from any parent.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: ObjectId::new(),
            version: VersionId::new(),
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            dirty: true,
            parent: None,
            unreported: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Setting the current value again is not a change
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.name {
            self.name = name;
            self.on_change(ChangeType::Benign);
        }
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        let display_name = display_name.into();
        if display_name != self.display_name {
            self.display_name = display_name;
            self.on_change(ChangeType::Benign);
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        if description != self.description {
            self.description = description;
            self.on_change(ChangeType::Benign);
        }
    }

    /// Record a semantic change: new version, dirty, and a pending
    /// notification for whichever container owns this object.
    pub fn on_change(&mut self, change: ChangeType) {
        self.version = VersionId::new();
        self.dirty = true;
        self.unreported = Some(match self.unreported {
            Some(pending) => pending.max(change),
            None => change,
        });
    }

    /// Take the strongest change raised since the last call, if any.
    pub fn take_unreported_change(&mut self) -> Option<ChangeType> {
        self.unreported.take()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_parent(&mut self, parent: ObjectId) {
        self.parent = Some(parent);
    }

    pub(crate) fn clear_parent(&mut self) {
        self.parent = None;
    }

    /// Inherit a child's pending change. Returns the kind re-raised on self.
    pub(crate) fn absorb(&mut self, child: &mut ObjectMeta) -> Option<ChangeType> {
        let change = child.take_unreported_change()?;
        tracing::trace!(child = %child.id, parent = %self.id, ?change, "propagating change");
        self.on_change(change);
        Some(change)
    }
}

impl PartialEq for ObjectMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.version == other.version
            && self.name == other.name
            && self.display_name == other.display_name
            && self.description == other.description
            && self.parent == other.parent
    }
}

/// Common behaviour of every entity in the analysis object graph
pub trait AnalysisObject {
    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn id(&self) -> ObjectId {
        self.meta().id()
    }

    fn version(&self) -> VersionId {
        self.meta().version()
    }

    fn name(&self) -> &str {
        self.meta().name()
    }

    fn display_name(&self) -> &str {
        self.meta().display_name()
    }

    fn description(&self) -> &str {
        self.meta().description()
    }

    fn is_dirty(&self) -> bool {
        self.meta().is_dirty()
    }

    fn parent(&self) -> Option<ObjectId> {
        self.meta().parent()
    }

    fn set_name(&mut self, name: &str) {
        self.meta_mut().set_name(name);
    }

    fn set_display_name(&mut self, display_name: &str) {
        self.meta_mut().set_display_name(display_name);
    }

    fn set_description(&mut self, description: &str) {
        self.meta_mut().set_description(description);
    }

    /// Acknowledge a save. Containers override this to also clear every
    /// object they own, unconditionally.
    fn clear_dirty_flag(&mut self) {
        self.meta_mut().clear_dirty();
    }

    fn uuid_equal(&self, other: &dyn AnalysisObject) -> bool {
        self.id() == other.id()
    }

    fn uuid_and_version_equal(&self, other: &dyn AnalysisObject) -> bool {
        self.id() == other.id() && self.version() == other.version()
    }
}

/// Implements [`AnalysisObject`] for a struct with a `meta` field and no
/// owned children.
macro_rules! leaf_analysis_object {
    ($ty:ty) => {
        impl $crate::model::AnalysisObject for $ty {
            fn meta(&self) -> &$crate::model::ObjectMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::model::ObjectMeta {
                &mut self.meta
            }
        }
    };
}

pub(crate) use leaf_analysis_object;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_object_is_dirty_with_display_name() {
        let meta = ObjectMeta::new("Wall Insulation");
        assert!(meta.is_dirty());
        assert_eq!(meta.display_name(), "Wall Insulation");
        assert!(meta.parent().is_none());
    }

    #[test]
    fn test_from_parts_is_clean() {
        let id = ObjectId::new();
        let version = VersionId::new();
        let meta = ObjectMeta::from_parts(id, version, "n", "Display", "desc");
        assert!(!meta.is_dirty());
        assert_eq!(meta.id(), id);
        assert_eq!(meta.version(), version);
        assert_eq!(meta.name(), "n");
        assert_eq!(meta.display_name(), "Display");
        assert_eq!(meta.description(), "desc");
    }

    #[test]
    fn test_setters_bump_version() {
        let mut meta = ObjectMeta::from_parts(ObjectId::new(), VersionId::new(), "a", "a", "");
        let before = meta.version();
        meta.set_description("longer description");
        assert_ne!(meta.version(), before);
        assert!(meta.is_dirty());
        assert_eq!(meta.take_unreported_change(), Some(ChangeType::Benign));
        assert_eq!(meta.take_unreported_change(), None);
    }

    #[test]
    fn test_setting_same_value_is_not_a_change() {
        let mut meta = ObjectMeta::from_parts(ObjectId::new(), VersionId::new(), "a", "b", "c");
        let before = meta.version();
        meta.set_name("a");
        meta.set_display_name("b");
        meta.set_description("c");
        assert_eq!(meta.version(), before);
        assert!(!meta.is_dirty());
        assert_eq!(meta.take_unreported_change(), None);
    }

    #[test]
    fn test_strongest_pending_change_wins() {
        let mut meta = ObjectMeta::new("a");
        meta.on_change(ChangeType::InvalidatesResults);
        meta.set_name("b");
        assert_eq!(
            meta.take_unreported_change(),
            Some(ChangeType::InvalidatesResults)
        );
    }

    #[test]
    fn test_duplicate_gets_new_identity() {
        let mut original = ObjectMeta::from_parts(ObjectId::new(), VersionId::new(), "a", "b", "c");
        original.set_parent(ObjectId::new());
        let copy = original.duplicate();
        assert_ne!(copy.id(), original.id());
        assert_ne!(copy.version(), original.version());
        assert!(copy.is_dirty());
        assert!(copy.parent().is_none());
        assert_eq!(copy.name(), "a");
        assert_eq!(copy.display_name(), "b");
        assert_eq!(copy.description(), "c");
    }

    #[test]
    fn test_absorb_reraises_child_change() {
        let mut parent = ObjectMeta::from_parts(ObjectId::new(), VersionId::new(), "p", "p", "");
        let mut child = ObjectMeta::new("c");
        child.on_change(ChangeType::InvalidatesResults);
        let before = parent.version();
        assert_eq!(
            parent.absorb(&mut child),
            Some(ChangeType::InvalidatesResults)
        );
        assert!(parent.is_dirty());
        assert_ne!(parent.version(), before);
        // Nothing left to report the second time
        assert_eq!(parent.absorb(&mut child), None);
    }
}
