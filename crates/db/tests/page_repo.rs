//! Repository tests against a real database.
//!
//! Ignored by default; run with `cargo test -p biolink-db -- --ignored`
//! when `DATABASE_URL` points at a disposable Postgres instance.

use biolink_core::block::{Block, BlockKind};
use biolink_core::page::PageData;
use biolink_db::models::event_block::UpsertEventBlock;
use biolink_db::models::page::{CreatePage, SavePageDraft};
use biolink_db::repositories::{ActivityRepo, EventBlockRepo, PageRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn draft(user_id: i64, slug: &str) -> SavePageDraft {
    let page = PageData::new(user_id, slug, "Ada");
    SavePageDraft::from_page_data(&page, "autosave").unwrap()
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_and_find_round_trip(pool: PgPool) {
    let page = PageData::new(1, "ada-lovelace", "Ada");
    let created = PageRepo::create(&pool, &CreatePage::from_page_data(&page).unwrap())
        .await
        .unwrap();

    let found = PageRepo::find_by_id(&pool, created.id).await.unwrap().unwrap();
    let data = found.to_page_data().unwrap();
    assert_eq!(data.slug, "ada-lovelace");
    assert_eq!(data.blocks.len(), 1);
    assert!(data.blocks[0].is_profile());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn save_draft_inserts_then_updates(pool: PgPool) {
    let first = PageRepo::save_draft(&pool, None, &draft(7, "seven")).await.unwrap();

    let mut dto = draft(7, "seven");
    dto.title = Some("Updated".into());
    let second = PageRepo::save_draft(&pool, Some(first.id), &dto).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title.as_deref(), Some("Updated"));
    assert_eq!(second.last_save_context.as_deref(), Some("autosave"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn save_draft_for_another_user_inserts_new_row(pool: PgPool) {
    let owned = PageRepo::save_draft(&pool, None, &draft(1, "owned")).await.unwrap();
    let other = PageRepo::save_draft(&pool, Some(owned.id), &draft(2, "other"))
        .await
        .unwrap();
    assert_ne!(owned.id, other.id);
    assert_eq!(other.user_id, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_slug_is_rejected(pool: PgPool) {
    PageRepo::save_draft(&pool, None, &draft(1, "taken")).await.unwrap();
    let err = PageRepo::save_draft(&pool, None, &draft(2, "taken")).await.unwrap_err();
    match err {
        sqlx::Error::Database(db) => {
            assert_eq!(db.constraint(), Some("uq_pages_slug"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn publish_snapshots_latest_draft(pool: PgPool) {
    let saved = PageRepo::save_draft(&pool, None, &draft(3, "three")).await.unwrap();
    assert!(PageRepo::find_published_by_slug(&pool, "three").await.unwrap().is_none());

    let slug = PageRepo::publish_latest_for_user(&pool, 3).await.unwrap();
    assert_eq!(slug.as_deref(), Some("three"));

    let published = PageRepo::find_published_by_slug(&pool, "three")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.id, saved.id);
    assert_eq!(published.published_blocks, saved.blocks);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn publish_without_pages_returns_none(pool: PgPool) {
    assert!(PageRepo::publish_latest_for_user(&pool, 404).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Event mirrors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn event_upsert_is_idempotent_and_deletable(pool: PgPool) {
    let page = PageRepo::save_draft(&pool, None, &draft(4, "four")).await.unwrap();
    let block = Block::new(BlockKind::Event);
    let dto = UpsertEventBlock::from_block(&block, page.id, 4).unwrap().unwrap();

    let first = EventBlockRepo::upsert(&pool, &dto).await.unwrap();
    let second = EventBlockRepo::upsert(&pool, &dto).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(EventBlockRepo::list_for_page(&pool, page.id).await.unwrap().len(), 1);

    assert!(EventBlockRepo::delete(&pool, 4, &block.id).await.unwrap());
    assert!(!EventBlockRepo::delete(&pool, 4, &block.id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn activity_is_listed_newest_first(pool: PgPool) {
    let page = PageRepo::save_draft(&pool, None, &draft(5, "five")).await.unwrap();
    let payload = serde_json::json!({});
    ActivityRepo::insert(&pool, Some(page.id), Some(5), "page.saved", &payload)
        .await
        .unwrap();
    ActivityRepo::insert(&pool, Some(page.id), Some(5), "page.published", &payload)
        .await
        .unwrap();

    let entries = ActivityRepo::list_for_page(&pool, page.id, 10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event_type, "page.published");
}
