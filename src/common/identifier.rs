use derivative::Derivative;
use derive_more::{Constructor, Deref};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Constructor, Deref, PartialEq, Eq, Hash, Debug)]
pub struct RawIdentifier(String);

#[derive(Derivative, Debug)]
#[derivative(PartialEq, Eq, Hash)]
pub enum SymbolIdentifier {
    Exact(Rc<RawIdentifier>),
    Generated {
        id: UniqueId,

        #[derivative(PartialEq = "ignore", Hash = "ignore")]
        descr: &'static str,
    },
}
impl SymbolIdentifier {
    pub fn new_exact<S: Into<String>>(name: S) -> Self {
        Self::Exact(Rc::new(RawIdentifier::new(name.into())))
    }
    pub fn new_generated(descr: &'static str) -> Self {
        Self::Generated { id: UniqueId::new(), descr }
    }
}

/// A branch target inside one function's body.
/// The front end creates these for control flow; the emitter creates more for
/// the instruction sequences that need internal skip/loop labels.
#[derive(PartialEq, Eq, Hash, Debug)]
pub struct JumpLabel {
    pub id: UniqueId,
    pub descr: &'static str,
}
impl JumpLabel {
    pub fn new(descr: &'static str) -> Self {
        Self { id: UniqueId::new(), descr }
    }
}

#[derive(PartialEq, Eq, Hash, Debug)]
pub struct UniqueId(u64);
impl UniqueId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        let curr_id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
        Self(curr_id)
    }
    pub fn as_int(&self) -> u64 {
        self.0
    }
}
