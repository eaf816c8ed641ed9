// src/ingest/providers/mod.rs
pub mod json_feed;
pub mod static_list;

pub use self::json_feed::JsonFeedProvider;
pub use self::static_list::StaticProvider;
