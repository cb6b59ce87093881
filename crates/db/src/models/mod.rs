pub mod activity;
pub mod event_block;
pub mod page;
