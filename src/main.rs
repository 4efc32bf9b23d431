#[tokio::main]
async fn main() {
    if let Err(e) = watchlist_sync::run().await {
        log::error!("{}", e);
        eprintln!("watchlist-sync: {}", e);
        std::process::exit(1);
    }
}
