#![forbid(unsafe_code)]
//! A CRDT document model: Object/Array/Text/Tree/Counter data types that
//! converge under concurrent edits via Lamport timestamps and version
//! vectors, wrapped in a transactional `Document` with pluggable network
//! sync (C1-C10).

pub mod array;
pub mod attachment;
pub mod change;
pub mod change_pack;
pub mod checkpoint;
pub mod counter;
pub mod document;
pub mod element;
pub mod error;
pub mod object;
pub mod ops;
pub mod primitive;
pub mod rga_split;
pub mod rht;
pub mod root;
pub mod text;
pub mod time;
pub mod tree;
pub mod version_vector;

pub use array::CRDTArray;
pub use attachment::{Attachment, NetworkAdapter, SyncMode};
pub use change::{Change, ChangeContext, ChangeID, PresenceChange};
pub use change_pack::ChangePack;
pub use checkpoint::Checkpoint;
pub use counter::CRDTCounter;
pub use document::{DocStatus, Document, DocumentOptions};
pub use element::{Element, ElementValue};
pub use error::{Error, Result};
pub use object::CRDTObject;
pub use ops::{Operation, OperationInfo};
pub use primitive::Primitive;
pub use root::CRDTRoot;
pub use text::CRDTText;
pub use time::{ActorID, Lamport, TimeTicket};
pub use tree::{CRDTTree, TreeNodeKind};
pub use version_vector::VersionVector;
