pub mod results_poller;

pub use results_poller::{PollEvent, PollStatus, PollerSettings, ResultsPoller};
