//! Linkdock — personal bookmark dashboard engine.
//!
//! Entry point: runs an interactive-free console walkthrough of the
//! dashboard against an in-memory store, showing optimistic inserts,
//! live change-feed reconciliation, search and pagination.

use std::sync::Arc;

use linkdock::app::{Dashboard, DashboardCommand};
use linkdock::managers::list_manager::BookmarkListTrait;
use linkdock::services::local_store::LocalStore;
use linkdock::services::store::BookmarkStore;
use linkdock::services::thumbnail::favicon_url;
use linkdock::types::bookmark::NewBookmark;
use linkdock::types::route::RouteState;

const DEMO_OWNER: &str = "demo-user";

#[tokio::main]
async fn main() {
    env_logger::init();

    println!();
    println!("Linkdock v{} — demo mode", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();

    let store: Arc<dyn BookmarkStore> = match LocalStore::open_in_memory() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to open demo store: {}", e);
            return;
        }
    };

    // A legacy row without a stored thumbnail, to exercise the repair path
    let legacy = NewBookmark {
        title: "Rust language".to_string(),
        url: "https://www.rust-lang.org".to_string(),
        owner_id: DEMO_OWNER.to_string(),
        thumbnail_url: None,
    };
    if let Err(e) = store.insert(&legacy).await {
        eprintln!("seed insert failed: {}", e);
        return;
    }

    let mut dashboard = Dashboard::new(Arc::clone(&store), DEMO_OWNER, RouteState::default());
    dashboard.connect();
    dashboard.run_until_idle().await;
    print_list("Initial page (thumbnail repaired on fetch)", &dashboard);

    dashboard.dispatch(DashboardCommand::Submit {
        title: "Crates registry".to_string(),
        url: "crates.io".to_string(),
    });
    dashboard.run_until_idle().await;
    print_list("After optimistic submit of a bare domain", &dashboard);

    dashboard.dispatch(DashboardCommand::Search("rust".to_string()));
    dashboard.run_until_idle().await;
    print_list("Search \"rust\"", &dashboard);

    dashboard.dispatch(DashboardCommand::Search(String::new()));
    dashboard.run_until_idle().await;

    if let Some(first) = dashboard.list().bookmarks().first().cloned() {
        dashboard.dispatch(DashboardCommand::Delete { id: first.id });
        dashboard.run_until_idle().await;
        print_list("After DB-first delete of the newest row", &dashboard);
    }

    for notice in dashboard.drain_notices() {
        println!("  notice: {:?}", notice);
    }
}

fn print_list(heading: &str, dashboard: &Dashboard) {
    let list = dashboard.list();
    println!(
        "{} — page {}/{} ({} total, query '{}'):",
        heading,
        list.current_page(),
        list.total_pages().max(1),
        list.total_count(),
        list.search_term(),
    );
    for bookmark in list.bookmarks() {
        println!(
            "  [{}] {} -> {} (thumb: {}, favicon: {})",
            &bookmark.id[..bookmark.id.len().min(8)],
            bookmark.title,
            bookmark.url,
            if bookmark.thumbnail_url.is_some() {
                "yes"
            } else {
                "no"
            },
            favicon_url(&bookmark.url).unwrap_or_else(|| "-".to_string()),
        );
    }
    println!();
}
