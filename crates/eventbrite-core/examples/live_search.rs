use chrono::{Duration, Utc};
use eventbrite_core::{Category, EventbriteScraper, RawPayload, SearchQuery};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let scraper = EventbriteScraper::new()?;

    let today = Utc::now().date_naive();
    let query = SearchQuery::new("ca--san-francisco", today, today + Duration::days(14))
        .category(Category::Music)
        .max_pages(2);

    println!("Searching music events in San Francisco...\n");

    let mut pages = scraper.search_pages(query);
    let mut first_url = None;
    while let Some(page) = pages.next_page().await? {
        println!("Page {} ({} events):", page.current_page, page.items.len());
        for event in &page.items {
            println!(
                "  {} | {} | {}",
                event.start_datetime.format("%Y-%m-%d %H:%M UTC"),
                event.name,
                event
                    .primary_venue
                    .address
                    .localized_area_display
                    .as_deref()
                    .unwrap_or("-")
            );
            first_url.get_or_insert_with(|| event.url.clone());
        }
    }

    if let Some(url) = first_url {
        println!("\nLoading event page {}\n", url);
        let event = scraper.load_profile(&url).await?;
        let flat = event.to_flat_map(RawPayload::Exclude)?;
        for (key, value) in &flat {
            if !value.is_null() {
                println!("  {}: {}", key, value);
            }
        }
    }

    Ok(())
}
