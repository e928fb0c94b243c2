use crate::models::Rating;
use crate::tasks::PollEvent;
use crate::voting::{ChangeFlags, DisplaySnapshot};

const BAR_WIDTH: usize = 20;
pub const CONNECTION_BANNER: &str = "⚠️  Connection lost. Reconnecting...";

/// Text rendering of the live results, fed by poll events.
#[derive(Debug, Default)]
pub struct Dashboard {
    snapshot: Option<DisplaySnapshot>,
    changes: ChangeFlags,
    banner_visible: bool,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Rendered(update) => {
                self.snapshot = Some(update.snapshot);
                self.changes = update.changes;
            }
            PollEvent::Degraded { .. } => self.banner_visible = true,
            PollEvent::Restored => self.banner_visible = false,
        }
    }

    pub fn banner_visible(&self) -> bool {
        self.banner_visible
    }

    pub fn snapshot(&self) -> Option<&DisplaySnapshot> {
        self.snapshot.as_ref()
    }

    /// Lines to print. Values that moved since the last render get a `*`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if self.banner_visible {
            lines.push(CONNECTION_BANNER.to_string());
        }

        let Some(snapshot) = &self.snapshot else {
            lines.push("Waiting for results...".to_string());
            return lines;
        };

        lines.push(format!(
            "Total votes: {}{}",
            snapshot.total_votes,
            marker(self.changes.total)
        ));
        lines.push(format!(
            "Average rating: {}{}",
            snapshot.average_label(),
            marker(self.changes.average)
        ));

        // Highest rating first, like the chart
        for rating in Rating::ALL.iter().rev() {
            let row = snapshot.row(*rating);
            let filled = (row.percentage as usize * BAR_WIDTH + 50) / 100;
            lines.push(format!(
                "{} {:<12} {}{} {:>3}% ({}{})",
                "★".repeat(rating.value() as usize),
                rating.name(),
                "█".repeat(filled),
                "░".repeat(BAR_WIDTH - filled),
                row.percentage,
                row.count,
                marker(self.changes.count(*rating)),
            ));
        }

        lines
    }
}

fn marker(changed: bool) -> &'static str {
    if changed { " *" } else { "" }
}
