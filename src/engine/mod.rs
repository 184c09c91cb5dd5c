pub mod acquisition;
pub mod channel;
pub mod meter;
pub mod reduction;
pub mod scheduler;
pub mod state;

pub use acquisition::AcquisitionPipeline;
pub use channel::{sample_channel, Acquired, PushOutcome, SampleReceiver, SampleSender};
pub use meter::PowerMeter;
pub use reduction::{HeldPeak, ReductionController, WindowSummary};
pub use scheduler::{ReductionCommand, ReductionWorker};
pub use state::AcquisitionState;
