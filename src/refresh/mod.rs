pub mod schedule;
pub mod scheduler;
pub mod timers;

pub use scheduler::RefreshScheduler;
pub use timers::RefreshCommand;
