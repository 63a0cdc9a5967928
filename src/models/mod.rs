//! Data models
//!
//! Persistent entities (`UserAccount`, `Session`) and the per-request view
//! models produced by the lookup service.

mod account;
mod lookup;
mod session;

pub use account::{AccountProfile, NewAccount, UserAccount};
pub use lookup::{
    ChapterResources, ChapterView, DefinitionItem, DictionaryView, PhraseCard, PhraseLookup,
    PhraseSegment, SearchMode, VideoCard, WordEntry,
};
pub use session::Session;
