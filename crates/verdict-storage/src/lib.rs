//! # verdict-storage
//!
//! Durable, append-only storage for operator feedback.
//!
//! Records are length-prefixed frames appended under an OS advisory lock,
//! so independent processes writing the same log never interleave bytes.
//! The same framing and lock are reused by the audit chain.

pub mod frame;
pub mod lock;
pub mod reader;
pub mod receipts;
pub mod store;

pub use frame::{FrameKind, FrameReader, RawFrame};
pub use lock::LockFile;
pub use reader::FeedbackReader;
pub use receipts::{CompactionReceipt, RecoveryReport, StoreReceipt};
pub use store::FeedbackStore;
