pub mod dashboard;
pub mod qr;
pub mod vote;

use crate::error::{Error, Result};
use crate::models::Rating;
use crate::tasks::ResultsPoller;
use log::{debug, error, info, warn};
use std::str::FromStr;

pub use dashboard::Dashboard;
pub use qr::QrPanel;
pub use vote::VoteManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Voting,
    Voted,
    Results,
}

/// Things a user can do to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Vote(i64),
    ShowResults,
    BackToVoting,
    DismissMessage,
    ToggleQr,
    ShowQr,
    ResetVote,
}

impl FromStr for Interaction {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        let input = input.trim();
        if let Ok(rating) = input.parse::<i64>() {
            return Ok(Interaction::Vote(rating));
        }
        match input {
            "results" | "r" => Ok(Interaction::ShowResults),
            "back" | "b" => Ok(Interaction::BackToVoting),
            "dismiss" | "retry" => Ok(Interaction::DismissMessage),
            "qr" => Ok(Interaction::ToggleQr),
            "show-qr" => Ok(Interaction::ShowQr),
            "reset" => Ok(Interaction::ResetVote),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Message shown under the vote buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Confirmed(Rating),
    AlreadyVoted,
    SubmitFailed,
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::Confirmed(rating) => format!(
                "Thanks for voting! You rated this talk {} ({}).",
                rating,
                rating.name()
            ),
            Notice::AlreadyVoted => "You have already voted! Thanks for your feedback.".to_string(),
            Notice::SubmitFailed => "Could not send your vote. Please try again.".to_string(),
        }
    }
}

/// The voting widget: which view is showing, whether the vote buttons are
/// usable, and the results poller that runs while the results view is open.
pub struct Widget {
    votes: VoteManager,
    poller: ResultsPoller,
    qr: QrPanel,
    view: View,
    voted: bool,
    controls_enabled: bool,
    notice: Option<Notice>,
}

impl Widget {
    pub fn new(votes: VoteManager, poller: ResultsPoller, qr: QrPanel) -> Self {
        Self {
            votes,
            poller,
            qr,
            view: View::Voting,
            voted: false,
            controls_enabled: true,
            notice: None,
        }
    }

    /// Pick up the persisted "has voted" flag.
    pub async fn init(&mut self) -> Result<()> {
        if self.votes.has_voted().await? {
            info!("Client has already voted, disabling vote controls");
            self.mark_voted();
            self.notice = Some(Notice::AlreadyVoted);
        }
        Ok(())
    }

    pub async fn handle(&mut self, interaction: Interaction) -> Result<()> {
        debug!("Handling interaction {:?}", interaction);
        match interaction {
            Interaction::Vote(raw) => self.handle_vote(raw).await?,
            Interaction::ShowResults => self.show_results(),
            Interaction::BackToVoting => self.show_voting(),
            Interaction::DismissMessage => {
                if self.notice == Some(Notice::SubmitFailed) {
                    self.notice = None;
                }
            }
            Interaction::ToggleQr => self.qr.toggle(),
            Interaction::ShowQr => self.qr.show(),
            Interaction::ResetVote => {
                self.votes.reset_vote_status().await?;
                self.voted = false;
                self.controls_enabled = true;
                self.notice = None;
                if self.view == View::Voted {
                    self.view = View::Voting;
                }
            }
        }
        Ok(())
    }

    async fn handle_vote(&mut self, raw: i64) -> Result<()> {
        if self.view == View::Results {
            debug!("Ignoring vote while the results view is open");
            return Ok(());
        }

        let rating = match Rating::new(raw) {
            Ok(rating) => rating,
            Err(e) => {
                warn!("Rejected vote: {}", e);
                return Err(e);
            }
        };

        // Disable buttons during submission
        self.controls_enabled = false;

        match self.votes.submit_vote(rating).await {
            Ok(()) => {
                self.mark_voted();
                self.notice = Some(Notice::Confirmed(rating));
            }
            Err(Error::AlreadyVoted) => {
                self.mark_voted();
                self.notice = Some(Notice::AlreadyVoted);
            }
            Err(e) if e.is_transport() => {
                error!("Vote submission failed: {}", e);
                self.controls_enabled = true;
                self.notice = Some(Notice::SubmitFailed);
            }
            Err(e) => {
                self.controls_enabled = true;
                self.notice = Some(Notice::SubmitFailed);
                return Err(e);
            }
        }
        Ok(())
    }

    fn mark_voted(&mut self) {
        self.voted = true;
        self.controls_enabled = false;
        if self.view == View::Voting {
            self.view = View::Voted;
        }
    }

    fn show_results(&mut self) {
        if self.view == View::Results {
            return;
        }
        self.view = View::Results;
        self.poller.start();
    }

    fn show_voting(&mut self) {
        if self.view != View::Results {
            return;
        }
        // Clean up results refresh when leaving
        self.poller.stop();
        self.view = if self.voted { View::Voted } else { View::Voting };
    }

    pub fn shutdown(&mut self) {
        self.poller.stop();
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn qr(&self) -> &QrPanel {
        &self.qr
    }

    pub fn poller(&self) -> &ResultsPoller {
        &self.poller
    }
}
