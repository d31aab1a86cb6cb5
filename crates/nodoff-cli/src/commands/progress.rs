use std::path::PathBuf;

use clap::Args;
use nodoff_core::format::clock;
use nodoff_core::memory::BookCatalog;
use nodoff_core::{ChapterSource, ChapterTable, Config, PreferencesStore, ProgressCalculator, ProgressUnit};

#[derive(Args)]
pub struct ProgressArgs {
    /// Playhead position in seconds
    #[arg(long)]
    position: f64,
    /// Book length in seconds; taken from the catalog when omitted
    #[arg(long)]
    duration: Option<f64>,
    /// Book catalog (TOML) providing chapters
    #[arg(long, requires = "book")]
    chapters: Option<PathBuf>,
    /// Book id inside the catalog
    #[arg(long, requires = "chapters")]
    book: Option<String>,
    /// Playback speed
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Print a one-line summary instead of JSON
    #[arg(long)]
    human: bool,
}

pub fn run(args: ProgressArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (table, catalog_duration) = match (&args.chapters, &args.book) {
        (Some(path), Some(book)) => {
            let catalog = BookCatalog::load(path)?;
            if catalog.book(book).is_none() {
                return Err(format!("book not found: {book}").into());
            }
            (catalog.current_chapters(book), catalog.duration(book))
        }
        _ => (ChapterTable::empty(), None),
    };

    let config = Config::load_or_default();
    let calculator = ProgressCalculator::new(
        config.apply_speed_to_elapsed(),
        config.apply_speed_to_total_remaining(),
    );
    let snapshot = calculator.compute(
        args.position,
        &table,
        args.duration.or(catalog_duration),
        args.speed,
    );

    if args.human {
        let unit = match snapshot.unit {
            ProgressUnit::Book => "book".to_string(),
            ProgressUnit::Chapter { index } => table
                .get(index)
                .map(|c| c.title.clone())
                .unwrap_or_else(|| format!("chapter {}", index + 1)),
        };
        println!(
            "{unit}: {} elapsed, {} left ({:.0}%), {} left in book",
            clock(snapshot.elapsed_within_unit),
            clock(snapshot.remaining_within_unit),
            snapshot.fraction * 100.0,
            clock(snapshot.total_remaining),
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}
