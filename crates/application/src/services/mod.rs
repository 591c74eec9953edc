pub mod dispatcher;
pub mod history_service;
pub mod message_router;
pub mod typing_service;

#[cfg(test)]
mod dispatcher_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::{Dispatcher, DispatcherDependencies};
pub use history_service::HistoryService;
pub use message_router::{MessageRouter, MessageRouterDependencies};
pub use typing_service::TypingCoordinator;
