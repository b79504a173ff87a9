//! activity-index - federated activity reads over per-user partitions
//!
//! Every participant owns one partition. Votes, reactions, replies and
//! follows are written by their author into the author's own partition; a
//! server partition carries secondary indexes that point back into them.
//! This crate reads those indexes and expands their pointers, pages through
//! notifications, and writes votes.
//!
//! ## Architecture
//!
//! - **Partition**: per-identity sled database of nested tables and blobs
//! - **Registry**: process-wide map of open partitions, loaded on demand
//! - **Directory**: network origin → identity
//! - **Resolver**: pointer URL → record, never crossing partitions
//! - **Aggregates / Notifications**: index reads with concurrent fan-out
//! - **Votes**: writes to the caller's own partition, then index signalling
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_dir>/
//! ├── partitions/            # Hosted partitions, one per identity
//! │   ├── alice.sled/
//! │   └── bob.sled/
//! ├── index.sled/            # Server partition with the secondary indexes
//! └── config.toml            # Configuration
//! ```

pub mod aggregate;
pub mod authors;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod fanout;
pub mod index;
pub mod lexint;
pub mod notifications;
pub mod partition;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod services;
pub mod types;
pub mod votes;

// Re-exports
pub use aggregate::{AggregateReader, ReactionsForSubject, VotesForSubject};
pub use authors::{Author, AuthorMemo, AuthorResolver};
pub use config::Config;
pub use directory::{IdentityDirectory, StaticDirectory};
pub use error::{IndexError, ResolutionFailure, Result};
pub use events::{EventBus, IndexEvent, IndexMaintainer};
pub use index::{IndexEntry, IndexKind, IndexStore};
pub use notifications::{Notification, NotificationEngine, NotificationQuery};
pub use partition::{KeyRange, Partition, Table};
pub use reference::Reference;
pub use registry::{PartitionLoader, PartitionRegistry};
pub use resolver::{GetOptions, ReferenceResolver, ResolvedEntry};
pub use services::Services;
pub use types::{Identity, SubjectSummary};
pub use votes::{Session, VoteInput, VoteService, VoteValue, VoteWriteResult};
