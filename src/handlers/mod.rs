pub mod command;
pub mod dispatcher;
pub mod sara;
pub mod standard;

use dispatcher::{CommandGroup, Dispatcher};

/// Every command group, in lookup order.
pub fn command_groups() -> Vec<Box<dyn CommandGroup>> {
    vec![Box::new(standard::Standard), Box::new(sara::Sara)]
}

pub fn build_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    for group in command_groups() {
        dispatcher.register(group);
    }
    dispatcher
}
