//! Pinzo Client - live, reconciled bookmark views.
//!
//! This crate keeps a local newest-first list of a user's bookmarks in step
//! with the server's change feed.
//!
//! # Quick Start
//!
//! ```ignore
//! use pinzo_client::{ClientConfig, ConnectionState, LiveView};
//! use pinzo_proto::RecordDraft;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("wss://pinzo.example/ws/changes")
//!         .with_credential(std::env::var("PINZO_TOKEN")?);
//!
//!     // Connects in the background and reconnects on its own
//!     let view = LiveView::connect(config);
//!     view.wait_for(|s| s.state == ConnectionState::Live).await?;
//!
//!     view.create(RecordDraft::new("Rust", "https://rust-lang.org"))?;
//!
//!     let mut updates = view.watch();
//!     while updates.changed().await.is_ok() {
//!         println!("{} bookmarks", updates.borrow().records.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod live;
pub mod reconciler;
pub mod view;

pub use config::{ClientConfig, ReconnectPolicy};
pub use error::Error;
pub use feed::{channel_feed, ChangeFeed, ChannelFeed, FeedPeer, WsFeed};
pub use live::{ConnectionState, LiveSnapshot, LiveView};
pub use reconciler::{Applied, Reconciler, Rollback};
pub use view::{SessionView, ViewUpdate};

/// Re-export protocol types.
pub use pinzo_proto as proto;
