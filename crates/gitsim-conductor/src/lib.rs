pub mod pipeline;
pub mod runner;
pub mod session;
pub mod state;

pub use pipeline::schema::{Phase, PhaseEffect, Pipeline, PipelineKind};
pub use runner::delay::{Delay, DelayOutcome, InstantDelay, TokioDelay};
pub use runner::event::{FullEvent, LedgerAction, SimEvent};
pub use runner::fault::{FaultInjector, NoFaults, ScriptedFaults};
pub use runner::notify::{CollectNotifier, Notifier, TracingNotifier};
pub use session::{OrchestratorStatus, RunReport, Simulator, SimulatorBuilder, Snapshot};
pub use state::machine::{PhaseState, PhaseStatus, RunState, RunStatus};
