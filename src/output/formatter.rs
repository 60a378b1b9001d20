//! Console presentation of a pipeline run

use crate::output::artifacts::ScoreEntry;
use crate::processing::pipeline::RunSummary;
use colored::{Color, Colorize};

/// Console formatter with optional colors
pub struct ConsoleFormatter {
    use_colors: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut out = String::new();

        out.push_str(&self.format_header(&format!("Top {} offers", summary.top.len()), 1));
        if summary.top.is_empty() {
            out.push_str("  (no offers were scored)\n");
        }
        for (i, entry) in summary.top.iter().enumerate() {
            out.push_str(&self.format_ranked_line(i + 1, entry));
        }
        for name in &summary.dropped {
            out.push_str(&format!("  ⚠️  '{}' has no matching listing and was skipped\n", name));
        }

        out.push_str(&self.format_header("Matches", 2));
        if summary.matches.is_empty() {
            out.push_str("  (no match produced)\n");
        }
        for entry in &summary.matches {
            out.push_str(&format!(
                "  • {} @ {} ({}) {}\n",
                entry.name,
                entry.company,
                entry.location,
                self.format_score_badge(entry.score)
            ));
            out.push_str(&format!(
                "    experiences: {:?}, cover letter: {} words\n",
                entry.skills,
                entry.cover_letter.split_whitespace().count()
            ));
        }

        out.push_str(&self.format_header("Saved", 3));
        out.push_str(&format!("  Scoring → {}\n", summary.scoring_path.display()));
        out.push_str(&format!("  Match   → {}\n", summary.match_path.display()));
        out
    }

    fn format_ranked_line(&self, rank: usize, entry: &ScoreEntry) -> String {
        format!(
            "  {}. [{:>3}/100] {} {}\n",
            rank,
            entry.score,
            entry.name,
            self.format_score_badge(entry.score)
        )
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };

        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_score_badge(&self, score: u8) -> String {
        let (badge, color) = match score {
            80..=100 => ("STRONG", Color::Green),
            60..=79 => ("GOOD", Color::Yellow),
            40..=59 => ("FAIR", Color::BrightYellow),
            _ => ("WEAK", Color::Red),
        };

        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }
}
