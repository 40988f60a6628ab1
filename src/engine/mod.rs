// The execution engine: state machines, prescription resolution,
// advancement, the progression rule engine, and the session lifecycle.

pub mod advancement;
pub mod enrollment;
pub mod loading;
pub mod machines;
pub mod progression;
pub mod resolver;
pub mod rules;
pub mod schedule;
pub mod session;
pub mod workout;

pub use advancement::{AdvanceContext, AdvanceOutcome};
pub use enrollment::EnrollmentService;
pub use loading::LoadCalculator;
pub use machines::StateMachine;
pub use progression::{AppliedProgression, ProgressionEngine};
pub use resolver::{BatchResolution, PrescriptionResolver, ResolutionFailure};
pub use rules::{RuleContext, RuleOutcome};
pub use schedule::{LookupContext, Scheduler};
pub use session::{LogSetInput, SessionService};
pub use workout::WorkoutBuilder;
