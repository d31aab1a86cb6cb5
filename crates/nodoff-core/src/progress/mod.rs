mod calculator;
mod chapters;

pub use calculator::{sanitize_speed, ProgressCalculator, ProgressSnapshot, ProgressUnit};
pub use chapters::{Chapter, ChapterTable};

#[cfg(test)]
pub(crate) use chapters::chapter;
