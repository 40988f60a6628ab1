// In-process event bus connecting the engine to its subscribers.

pub mod bus;

pub use bus::{EventBus, EventSubscriber};
