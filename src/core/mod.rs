/// Gateway core: per-device controllers, the command set, the ordered
/// invoker and the topic router.
///
/// Data flows event source -> `Dispatcher` (router) -> `InvokerHandle` ->
/// `Invoker` consumer -> `Command::execute` -> `Controller` -> `Device`.
pub mod command;
pub mod controller;
pub mod error;
pub mod invoker;
pub mod router;

pub use command::{Command, Outcome};
pub use controller::{
    format_coils, Controller, SharedController, TimerBlock, Validation, TIMER_BLOCK_LEN,
};
pub use error::GatewayError;
pub use invoker::{Invoker, InvokerHandle, InvokerState, Report};
pub use router::{parse_topic, Action, Dispatch, Dispatcher, Router};
