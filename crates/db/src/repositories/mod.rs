pub mod activity_repo;
pub mod event_block_repo;
pub mod page_repo;

pub use activity_repo::ActivityRepo;
pub use event_block_repo::EventBlockRepo;
pub use page_repo::PageRepo;
